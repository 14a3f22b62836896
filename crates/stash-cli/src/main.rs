//! stash CLI entrypoint.

use clap::Parser;
use stash_cli::flags::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    stash_cli::run(cli.into()).await
}
