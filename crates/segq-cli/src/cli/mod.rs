//! CLI for the segq queue engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use segq_core::config::{self, SegqConfig};
use std::path::PathBuf;

use commands::{run_config, run_parts_encode, run_parts_needed, run_simulate, SimulateOptions};

/// Top-level CLI for the segq queue engine.
#[derive(Debug, Parser)]
#[command(name = "segq")]
#[command(about = "segq: segmented-transfer queue engine", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the XDG config dir.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a file of SIZE bytes from simulated peers and report how it was split.
    Simulate {
        /// File size in bytes.
        #[arg(long, value_name = "BYTES")]
        size: u64,
        /// Number of peers.
        #[arg(long, default_value = "4", value_name = "K")]
        peers: usize,
        /// Concurrent segment limit (default from config).
        #[arg(long, value_name = "M")]
        max_segments: Option<usize>,
        /// Fetch the end of the file early.
        #[arg(long)]
        want_end: bool,
        /// How many of the peers only have part of the file.
        #[arg(long, default_value = "0", value_name = "P")]
        partial_peers: usize,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Encode or compare partial-availability bitmaps.
    Parts {
        #[command(subcommand)]
        command: PartsCommand,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Debug, Subcommand)]
pub enum PartsCommand {
    /// Encode completed byte ranges (START-END, end exclusive) as a bitmap.
    Encode {
        /// File size in bytes.
        #[arg(long, value_name = "BYTES")]
        size: u64,
        /// Block size in bytes.
        #[arg(long, value_name = "BYTES")]
        block: u64,
        /// Completed ranges, e.g. 0-300000.
        #[arg(value_name = "RANGE")]
        ranges: Vec<String>,
    },

    /// Check whether THEIRS has a block missing from OURS (comma-separated bitmaps).
    Needed { theirs: String, ours: String },
}

fn load_config(path: Option<&PathBuf>) -> Result<SegqConfig> {
    match path {
        Some(p) => config::load_from_path(p),
        None => config::load_or_init(),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = load_config(cli.config.as_ref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Simulate {
                size,
                peers,
                max_segments,
                want_end,
                partial_peers,
                json,
            } => {
                let opts = SimulateOptions {
                    size,
                    peers,
                    max_segments,
                    want_end,
                    partial_peers,
                };
                run_simulate(&cfg, opts, json).await?
            }
            CliCommand::Parts { command } => match command {
                PartsCommand::Encode {
                    size,
                    block,
                    ranges,
                } => run_parts_encode(size, block, &ranges)?,
                PartsCommand::Needed { theirs, ours } => run_parts_needed(&theirs, &ours)?,
            },
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
