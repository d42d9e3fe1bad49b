//! CLI parse tests (split per command group).

use super::{Cli, CliCommand};
use clap::Parser;

pub(super) fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

pub(super) const ID: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

mod add_serve;
