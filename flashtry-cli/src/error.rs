//! CLI error type and its exit codes.

use {std::path::PathBuf, thiserror::Error};

/// Exit code for runtime failures.
pub const EXIT_RUNTIME: i32 = 1;

/// Exit code for usage errors and an unreachable device.
pub const EXIT_USAGE: i32 = 2;

/// Failures that stop the CLI before or around a run.
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid arguments or configuration values.
    #[error("{0}")]
    Usage(String),

    /// The event log could not be created.
    #[error("cannot create log file {}: {source}", path.display())]
    LogFile {
        /// Requested log path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => EXIT_USAGE,
            Self::LogFile { .. } => EXIT_RUNTIME,
        }
    }
}

/// Exit code for any error reaching `main`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<CliError>()
        .map_or(EXIT_RUNTIME, CliError::exit_code)
}
