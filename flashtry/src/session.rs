//! Command/response session over the device console.
//!
//! [`CommandSession`] turns a [`Channel`] into a "send a line, wait for the
//! prompt" primitive. Completion is only ever inferred: the console has no
//! framing, so a command is considered finished once [`PromptDetector`]
//! sees the prompt again, or given up on when the timeout expires.
//!
//! Everything received is written to the [`EventLog`] as `SER` entries, one
//! per physical line, in the order it arrived.

use {
    crate::{
        error::Result,
        event_log::{EventLog, Tag},
        port::{Channel, Connector, SerialConfig},
        prompt::PromptDetector,
        text::LineAssembler,
    },
    log::{debug, trace},
    std::{
        thread,
        time::{Duration, Instant},
    },
};

/// Terminator appended to every command.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Idle sleep between reads that returned nothing.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Pause after opening the port before reading.
pub const OPEN_SETTLE: Duration = Duration::from_millis(200);

/// How long stale output is drained after opening.
pub const OPEN_DRAIN: Duration = Duration::from_millis(500);

/// Default wait for the prompt.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(8);

/// Longest single wait; larger requests are clamped to it.
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of one command.
///
/// `prompt_detected == false` is not an error: it is recorded and the
/// scenario carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Command text as sent, without terminator.
    pub command: String,
    /// Whether the prompt came back before the timeout.
    pub prompt_detected: bool,
}

/// Timing knobs of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTiming {
    /// Wait used by [`CommandSession::send`].
    pub default_timeout: Duration,
    /// Idle sleep between empty reads.
    pub poll_interval: Duration,
    /// Pause after opening.
    pub settle: Duration,
    /// Drain window after the settle pause.
    pub drain: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_PROMPT_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            settle: OPEN_SETTLE,
            drain: OPEN_DRAIN,
        }
    }
}

/// One open console and its prompt state.
///
/// The session owns the channel and closes it when dropped, so the port is
/// released on every exit path.
pub struct CommandSession<C: Channel> {
    channel: C,
    detector: PromptDetector,
    log: EventLog,
    timing: SessionTiming,
    lines: LineAssembler,
    drained_prompt: bool,
}

impl<C: Channel> CommandSession<C> {
    /// Wrap an already open channel.
    pub fn new(channel: C, log: EventLog, timing: SessionTiming) -> Self {
        Self {
            channel,
            detector: PromptDetector::new(),
            log,
            timing,
            lines: LineAssembler::new(),
            drained_prompt: false,
        }
    }

    /// Open a channel through `connector`, let it settle and drain stale
    /// output into the log.
    pub fn open<K>(
        connector: &mut K,
        serial: &SerialConfig,
        log: EventLog,
        timing: SessionTiming,
    ) -> Result<Self>
    where
        K: Connector<Channel = C>,
    {
        let channel = connector.open(serial)?;
        debug!("Opened {} @ {}", serial.port_name, serial.baud_rate);

        let mut session = Self::new(channel, log, timing);
        thread::sleep(session.timing.settle);
        let drain = session.timing.drain;
        session.drained_prompt = session.drain(drain);
        Ok(session)
    }

    /// Read and log everything arriving for `duration`.
    ///
    /// Returns whether a prompt passed by while draining.
    pub fn drain(&mut self, duration: Duration) -> bool {
        self.detector.reset();
        let deadline = deadline_after(duration);
        let mut seen = false;

        while Instant::now() < deadline {
            match self.channel.read_available() {
                Ok(bytes) if !bytes.is_empty() => {
                    let detection = self.detector.feed(&bytes);
                    self.log_serial(&detection.text);
                    seen |= detection.matched();
                },
                Ok(_) => self.idle(deadline),
                Err(e) => {
                    trace!("Read error while draining: {e}");
                    self.idle(deadline);
                },
            }
        }

        self.flush_serial();
        seen
    }

    /// Whether the drain after opening already saw a prompt.
    pub fn prompt_seen_while_draining(&self) -> bool {
        self.drained_prompt
    }

    /// Send `text` and wait up to `timeout` for the prompt.
    ///
    /// The `CMD` entry is logged before anything is written, so it always
    /// precedes the `SER` entries of the response.
    pub fn send_cmd(&mut self, text: &str, timeout: Duration) -> CommandResult {
        self.log.cmd(text);

        let line = format!("{text}{LINE_TERMINATOR}");
        if let Err(e) = self.channel.send(line.as_bytes()) {
            self.log
                .error(&format!("Failed to send '{text}': {e}"));
            return CommandResult {
                command: text.to_string(),
                prompt_detected: false,
            };
        }

        let prompt_detected = self.wait_for_prompt(timeout);
        if !prompt_detected {
            debug!("No prompt within {timeout:?} after '{text}'");
        }

        CommandResult {
            command: text.to_string(),
            prompt_detected,
        }
    }

    /// [`send_cmd`](Self::send_cmd) with the session's default timeout.
    pub fn send(&mut self, text: &str) -> CommandResult {
        let timeout = self.timing.default_timeout;
        self.send_cmd(text, timeout)
    }

    /// Poll the channel until the prompt appears or `timeout` elapses.
    ///
    /// Read errors count as silence; a device in reset may make its port
    /// briefly unreadable.
    pub fn wait_for_prompt(&mut self, timeout: Duration) -> bool {
        self.detector.reset();
        let deadline = deadline_after(timeout);
        let mut read_error_noted = false;

        while Instant::now() < deadline {
            match self.channel.read_available() {
                Ok(bytes) if !bytes.is_empty() => {
                    let detection = self.detector.feed(&bytes);
                    self.log_serial(&detection.text);
                    if let Some(prompt) = detection.prompt {
                        trace!("Prompt: {prompt:?}");
                        self.flush_serial();
                        return true;
                    }
                },
                Ok(_) => self.idle(deadline),
                Err(e) => {
                    if !read_error_noted {
                        debug!("Treating read error as silence: {e}");
                        read_error_noted = true;
                    }
                    self.idle(deadline);
                },
            }
        }

        self.flush_serial();
        false
    }

    /// Handle to the session's event log.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Close the channel. Idempotent.
    pub fn close(&mut self) {
        if self.channel.is_open() {
            debug!("Closing {}", self.channel.name());
        }
        self.channel.close();
    }

    /// Log every line `text` completes; a partial line waits for the rest.
    fn log_serial(&mut self, text: &str) {
        for line in self.lines.push(text) {
            self.log.record(Tag::Ser, &line);
        }
    }

    /// Log the unterminated tail, e.g. a prompt, once a wait is over.
    fn flush_serial(&mut self) {
        if let Some(rest) = self.lines.flush() {
            self.log.record(Tag::Ser, &rest);
        }
    }

    fn idle(&self, deadline: Instant) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        thread::sleep(self.timing.poll_interval.min(remaining));
    }
}

fn deadline_after(wait: Duration) -> Instant {
    Instant::now() + wait.min(MAX_WAIT)
}

impl<C: Channel> Drop for CommandSession<C> {
    fn drop(&mut self) {
        self.close();
    }
}
