//! `improver-wind-downscaling`: the wind downscaling tool as its own binary.

use std::process::ExitCode;

use improver::cli;

fn main() -> ExitCode {
    cli::init_logging(false);
    cli::run_tool("wind-downscaling", std::env::args_os().skip(1))
}
