//! Per-item source table.
//!
//! Tracks every peer known to have the file, split into usable (active) sources
//! and excluded (bad) ones tagged with the reason they were dropped. Partial
//! sources also carry the availability bitmap they advertised.

mod entry;
mod flags;
mod table;

pub use entry::{PartialSource, Source, MAX_PENDING_QUERIES};
pub use flags::SourceFlags;
pub use table::{PfsCandidate, SourceTable};
