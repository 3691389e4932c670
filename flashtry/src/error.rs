//! Error types for flashtry.

use std::io;
use thiserror::Error;

/// Result type for flashtry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for flashtry operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, log file, child process pipes).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The serial device could not be opened.
    #[error("Cannot open {path}: {reason}")]
    Connection {
        /// Device path that was attempted.
        path: String,
        /// Why the open failed (missing device, permission, busy port).
        reason: String,
    },

    /// Writing to the channel failed, typically because it is closed.
    #[error("Write failed: {0}")]
    Write(String),

    /// No serial device could be resolved.
    #[error("No serial device found")]
    DeviceNotFound,

    /// The flashing tool could not be launched.
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        /// Program that was attempted.
        program: String,
        /// Underlying launch error.
        source: io::Error,
    },

    /// Unsupported operation or missing capability.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Whether this error ends a run with the fatal exit code.
    ///
    /// Only failing to reach the serial device is fatal; everything else the
    /// scenario records and moves past.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceNotFound | Self::Connection { .. })
    }
}
