//! `segq config` – print the effective configuration.

use anyhow::{Context, Result};
use segq_core::config::SegqConfig;

pub fn run_config(cfg: &SegqConfig) -> Result<()> {
    if let Ok(path) = segq_core::config::config_path() {
        println!("# config: {}", path.display());
    }
    if let Ok(path) = segq_core::logging::log_file_path() {
        println!("# log:    {}", path.display());
    }
    let text = toml::to_string_pretty(cfg).context("serializing config")?;
    print!("{text}");
    Ok(())
}
