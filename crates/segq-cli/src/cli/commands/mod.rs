//! CLI command handlers. Each command is in its own file.

mod config;
mod parts;
mod simulate;

pub use config::run_config;
pub use parts::{run_parts_encode, run_parts_needed};
pub use simulate::{run_simulate, SimulateOptions};
