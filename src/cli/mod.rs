//! Command Line Interface (CLI) layer for IMPROVER.
//!
//! `args` defines one parser per tool plus the `improver TOOL ...`
//! dispatcher, `usage` renders banners and help in the classic argparse
//! layout, `errors` maps outcomes to exit codes, `report` formats
//! verification output and `runner` wires each tool to `improver::api`.
//!
//! If you are embedding IMPROVER into another application, prefer using
//! the high-level `improver::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod report;
pub mod runner;
pub mod usage;

pub use args::CliArgs;
pub use errors::AppError;
pub use runner::{TOOLS, init_logging, run, run_tool};
