use std::process::ExitCode;

use thiserror::Error;

/// How a tool invocation ended when it did not succeed
#[derive(Debug, Error)]
pub enum AppError {
    /// `-h` / `--help`: the text goes to stdout and the exit is clean
    #[error("{0}")]
    Help(String),

    #[error("{usage}\n{prog}: error: {message}")]
    Usage {
        prog: String,
        usage: String,
        message: String,
    },

    #[error("{prog}: error: {source}")]
    Runtime {
        prog: String,
        #[source]
        source: crate::Error,
    },
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Help(_) => 0,
            AppError::Usage { .. } => 2,
            AppError::Runtime { .. } => 1,
        }
    }

    /// Print to the stream argparse would use and return the exit status
    pub fn report(&self) -> ExitCode {
        match self {
            AppError::Help(text) => print!("{}", text),
            other => eprintln!("{}", other),
        }
        ExitCode::from(self.exit_code())
    }
}
