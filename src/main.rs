//! IMPROVER CLI entrypoint.
//!
//! Provides a thin wrapper over the `cli` module: parse the dispatcher
//! arguments, run the named tool and exit with its status.
//! For programmatic use, prefer the library API (`improver::api`).

use std::process::ExitCode;

use clap::Parser;
use improver::cli;

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();
    cli::run(args)
}
