//! CLI parse tests.

use super::{Cli, CliCommand, PartsCommand};
use clap::Parser;

pub(super) fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

mod parts_config;
