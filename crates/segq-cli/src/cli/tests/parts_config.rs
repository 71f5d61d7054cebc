//! Tests for the parts and config subcommands.

use super::{parse, PartsCommand};
use crate::cli::CliCommand;

#[test]
fn cli_parse_parts_encode() {
    match parse(&[
        "segq", "parts", "encode", "--size", "1000000", "--block", "100000", "0-300000",
        "500000-600000",
    ]) {
        CliCommand::Parts {
            command: PartsCommand::Encode {
                size,
                block,
                ranges,
            },
        } => {
            assert_eq!(size, 1_000_000);
            assert_eq!(block, 100_000);
            assert_eq!(ranges, vec!["0-300000", "500000-600000"]);
        }
        _ => panic!("expected Parts Encode"),
    }
}

#[test]
fn cli_parse_parts_needed() {
    match parse(&["segq", "parts", "needed", "0,5", "0,3"]) {
        CliCommand::Parts {
            command: PartsCommand::Needed { theirs, ours },
        } => {
            assert_eq!(theirs, "0,5");
            assert_eq!(ours, "0,3");
        }
        _ => panic!("expected Parts Needed"),
    }
}

#[test]
fn cli_parse_config() {
    match parse(&["segq", "config"]) {
        CliCommand::Config => {}
        _ => panic!("expected Config"),
    }
}
