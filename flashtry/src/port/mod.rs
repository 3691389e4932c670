//! Byte-level channel to the device console.
//!
//! This module provides the [`Channel`] trait the session layer talks to, and
//! the [`Connector`] trait that resolves and opens channels:
//!
//! - **Native platforms** (Linux, macOS, Windows): `serialport` backed
//!   [`NativeChannel`] behind the `native` feature
//! - **Tests**: scripted in-memory channels
//!
//! ## Architecture
//!
//! ```text
//! +--------------------+
//! |   CommandSession   |  framing, prompt detection, event log
//! +---------+----------+
//!           |
//!           v
//! +---------+----------+
//! |   Channel trait    |  read_available / write / flush / close
//! +---------+----------+
//!           |
//!           v
//! +---------+----------+
//! |   NativeChannel    |
//! |    (serialport)    |
//! +--------------------+
//! ```
//!
//! Channels never log. Recording traffic is the caller's job.

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Default baud rate of the device console.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Upper bound on how long a single `read_available` call may block.
pub const READ_POLL_SLICE: Duration = Duration::from_millis(100);

/// Serial port configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyACM0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout of the underlying handle.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD,
            timeout: READ_POLL_SLICE,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the read timeout, clamped to [`READ_POLL_SLICE`].
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(READ_POLL_SLICE);
        self
    }
}

/// Raw transport to the device console.
///
/// Implementations must keep `read_available` short: it returns whatever is
/// buffered (possibly nothing) and never blocks longer than
/// [`READ_POLL_SLICE`].
pub trait Channel {
    /// Read whatever bytes are currently available. May be empty.
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Queue bytes for transmission.
    ///
    /// Fails with [`Error::Write`](crate::Error::Write) once the channel is
    /// closed.
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Push queued bytes out to the device.
    fn flush(&mut self) -> Result<()>;

    /// Release the transport. Safe to call repeatedly.
    fn close(&mut self);

    /// Whether the channel is still open.
    fn is_open(&self) -> bool;

    /// Port name/path.
    fn name(&self) -> &str;

    /// Write all bytes and flush them.
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.write_bytes(data)?;
        self.flush()
    }
}

/// Opens channels and answers whether a device node exists.
///
/// Separated from [`Channel`] because resolution happens before any channel
/// is open.
pub trait Connector {
    /// Channel type produced by [`open`](Self::open).
    type Channel: Channel;

    /// Whether a device node exists at `path`.
    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    /// Open the device described by `config`.
    ///
    /// Fails with [`Error::Connection`](crate::Error::Connection) when the
    /// device is missing, not permitted or busy.
    fn open(&mut self, config: &SerialConfig) -> Result<Self::Channel>;
}

#[cfg(feature = "native")]
pub use native::{NativeChannel, NativeConnector};
