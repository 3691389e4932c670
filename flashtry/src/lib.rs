//! # flashtry
//!
//! Flash a Zephyr board, then drive its serial shell through a scripted
//! configure, reboot and re-verify sequence while recording every exchange.
//!
//! The heart of the crate is [`CommandSession`]: it writes one command line
//! at a time, streams whatever the device prints into a timestamped
//! [`EventLog`], and returns once a shell prompt (`~$`) shows up or the
//! timeout runs out. Timeouts are never errors. A missing prompt is logged
//! and the next command goes out anyway, so the log always holds the whole
//! story of a run.
//!
//! ## Layers
//!
//! - [`port`]: byte channels to the device ([`Channel`], [`Connector`])
//! - [`prompt`]: prompt detection over a bounded tail of device output
//! - [`session`]: command/response exchanges and connection lifetime
//! - [`reboot`]: reboot plus prompt resynchronisation
//! - [`runner`] and [`flash`]: the `west flash` subprocess
//! - [`scenario`]: the full stage sequence and its exit code
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via the `serialport` crate
//!
//! ## Example
//!
//! ```rust,no_run
//! use flashtry::{EventLog, NativeConnector, Scenario, ScenarioConfig, SubprocessRunner};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let log = EventLog::create("flash_try.log".as_ref(), true)?;
//!     let config = ScenarioConfig {
//!         serial: Some("/dev/ttyACM0".to_string()),
//!         ..ScenarioConfig::default()
//!     };
//!
//!     let mut runner = SubprocessRunner::new(log.clone());
//!     let report = Scenario::new(config, log).run(&mut runner, &mut NativeConnector);
//!     std::process::exit(report.exit_code());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod device;
pub mod error;
pub mod event_log;
pub mod flash;
pub mod host;
pub mod port;
pub mod prompt;
pub mod reboot;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod shell;
pub mod text;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativeChannel, NativeConnector};
pub use {
    device::{DEFAULT_CANDIDATES, first_existing, resolve_device},
    error::{Error, Result},
    event_log::{EventLog, MemorySink, Tag},
    flash::{FlashCommand, FlashRunner},
    host::{SerialSupport, list_ports, serial_support},
    port::{Channel, Connector, DEFAULT_BAUD, SerialConfig},
    prompt::{PromptDetector, is_prompt_line},
    reboot::{RebootPlan, RebootRecovery, RebootReport, Resync},
    runner::{ProcessRunner, SubprocessRunner},
    scenario::{EXIT_NO_DEVICE, EXIT_SUCCESS, Scenario, ScenarioConfig, ScenarioReport, Stage},
    session::{CommandResult, CommandSession, DEFAULT_PROMPT_TIMEOUT, MAX_WAIT, SessionTiming},
};
