//! Append-only, flushed-on-write event log of a harness run.
//!
//! Every entry is one line:
//!
//! ```text
//! [2026-10-16 09:12:44] CMD: stepper persist dump
//! ```
//!
//! The line is flushed before [`EventLog::record`] returns so that a crash
//! mid-run leaves a truthful partial log. Entries are optionally echoed to
//! stdout as they are written.

use {
    chrono::Local,
    std::{
        fmt,
        fs::File,
        io::{self, Write},
        path::Path,
        sync::{Arc, Mutex, PoisonError},
    },
};

/// Timestamp layout of every entry.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Category of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Command sent to the device shell.
    Cmd,
    /// Text received from the serial console.
    Ser,
    /// External command launched.
    Run,
    /// Output line of an external command.
    Out,
    /// Exit code of an external command.
    Rc,
    /// Advisory failure; the run continues.
    Warn,
    /// Failure; fatal only when it stops the scenario.
    Error,
    /// Progress marker.
    Info,
    /// Scenario completed.
    Success,
}

impl Tag {
    /// Text written before the colon.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cmd => "CMD",
            Self::Ser => "SER",
            Self::Run => "RUN",
            Self::Out => "OUT",
            Self::Rc => "RC",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format one entry without its trailing newline.
pub fn format_entry(timestamp: &str, tag: Tag, text: &str) -> String {
    format!("[{timestamp}] {tag}: {text}")
}

struct Sink {
    writer: Box<dyn Write + Send>,
    echo: Option<Box<dyn Write + Send>>,
    failed: bool,
}

/// Shared handle to the run's event log.
///
/// Cloning is cheap; all clones append to the same sink in call order.
#[derive(Clone)]
pub struct EventLog {
    sink: Arc<Mutex<Sink>>,
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .finish_non_exhaustive()
    }
}

impl EventLog {
    /// Log to an arbitrary writer, echoing to stdout when `echo` is set.
    pub fn new(writer: impl Write + Send + 'static, echo: bool) -> Self {
        let echo: Option<Box<dyn Write + Send>> = if echo {
            Some(Box::new(io::stdout()))
        } else {
            None
        };
        Self::with_echo(writer, echo)
    }

    /// Log to `writer` and echo every entry to `echo`.
    ///
    /// A failing echo (closed pipe, full device) is dropped for the rest of
    /// the run; the log itself keeps being written.
    pub fn with_echo(
        writer: impl Write + Send + 'static,
        echo: Option<Box<dyn Write + Send>>,
    ) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Sink {
                writer: Box::new(writer),
                echo,
                failed: false,
            })),
        }
    }

    /// Create (truncating) the log file at `path`.
    pub fn create(path: &Path, echo: bool) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(file, echo))
    }

    /// Append one entry and flush it.
    ///
    /// Multi-line text is written as one entry per line. A failing sink is
    /// reported once through the `log` facade and then ignored, so a full
    /// disk never aborts the run.
    pub fn record(&self, tag: Tag, text: &str) {
        let timestamp = Local::now()
            .format(TIMESTAMP_FORMAT)
            .to_string();

        // A panic elsewhere while holding the lock must not silence the log
        let mut sink = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        for line in text.split('\n') {
            let entry = format_entry(&timestamp, tag, line.trim_end_matches('\r'));

            let written = writeln!(sink.writer, "{entry}").and_then(|()| sink.writer.flush());
            if let Err(e) = written {
                if !sink.failed {
                    log::error!("Event log write failed: {e}");
                    sink.failed = true;
                }
            }

            let echoed = sink
                .echo
                .as_mut()
                .map(|echo| writeln!(echo, "{entry}").and_then(|()| echo.flush()));
            if let Some(Err(e)) = echoed {
                log::debug!("Disabling log echo: {e}");
                sink.echo = None;
            }
        }
    }

    /// Record a [`Tag::Cmd`] entry.
    pub fn cmd(&self, text: &str) {
        self.record(Tag::Cmd, text);
    }

    /// Record a [`Tag::Warn`] entry.
    pub fn warn(&self, text: &str) {
        log::debug!("WARN: {text}");
        self.record(Tag::Warn, text);
    }

    /// Record a [`Tag::Error`] entry.
    pub fn error(&self, text: &str) {
        log::debug!("ERROR: {text}");
        self.record(Tag::Error, text);
    }

    /// Record a [`Tag::Info`] entry.
    pub fn info(&self, text: &str) {
        self.record(Tag::Info, text);
    }
}

/// In-memory writer whose contents stay readable after being handed to an
/// [`EventLog`].
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        self.buf
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }

    /// Logged entries as `(tag, text)` pairs, timestamps stripped.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.contents()
            .lines()
            .filter_map(parse_entry)
            .collect()
    }
}

impl Write for MemorySink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .map_err(|_| io::Error::other("memory sink poisoned"))?
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Split a formatted entry into its tag and text.
pub fn parse_entry(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix('[')?;
    let (_, rest) = rest.split_once("] ")?;
    let (tag, text) = rest.split_once(": ")?;
    Some((tag.to_string(), text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_entry_layout() {
        assert_eq!(
            format_entry("2026-10-16 09:12:44", Tag::Cmd, "kernel threads"),
            "[2026-10-16 09:12:44] CMD: kernel threads"
        );
    }

    #[test]
    fn test_record_writes_timestamped_lines() {
        let sink = MemorySink::new();
        let log = EventLog::new(sink.clone(), false);
        log.cmd("stepper persist dump");
        log.warn("No prompt detected after connect; continuing");

        let contents = sink.contents();
        let first = contents.lines().next().unwrap_or_default();
        // "[YYYY-MM-DD HH:MM:SS] " is 22 characters
        assert_eq!(first.len(), 22 + "CMD: stepper persist dump".len());
        assert_eq!(&first[0..1], "[");
        assert_eq!(&first[5..6], "-");
        assert_eq!(&first[11..12], " ");
        assert_eq!(&first[20..22], "] ");

        assert_eq!(
            sink.entries(),
            vec![
                ("CMD".to_string(), "stepper persist dump".to_string()),
                (
                    "WARN".to_string(),
                    "No prompt detected after connect; continuing".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_multiline_text_becomes_separate_entries() {
        let sink = MemorySink::new();
        let log = EventLog::new(sink.clone(), false);
        log.record(Tag::Out, "line one\r\nline two");
        assert_eq!(
            sink.entries(),
            vec![
                ("OUT".to_string(), "line one".to_string()),
                ("OUT".to_string(), "line two".to_string()),
            ]
        );
    }

    #[test]
    fn test_clones_share_sink_in_order() {
        let sink = MemorySink::new();
        let log = EventLog::new(sink.clone(), false);
        let other = log.clone();
        log.info("first");
        other.info("second");
        log.info("third");
        let texts: Vec<String> = sink
            .entries()
            .into_iter()
            .map(|(_, text)| text)
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_file_log_is_durable_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let log = EventLog::create(&path, false).unwrap();
        log.record(Tag::Rc, "0");
        // Readable before the handle is dropped
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("] RC: 0\n"));
    }

    /// Writer failing every call, like stdout on a closed pipe.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _data: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_failing_echo_keeps_file_log_complete() {
        let sink = MemorySink::new();
        let log = EventLog::with_echo(sink.clone(), Some(Box::new(BrokenPipe)));
        log.info("Flash+Try starting");
        log.cmd("kernel threads");
        log.record(Tag::Success, "Flash+Try sequence completed");

        let tags: Vec<String> = sink
            .entries()
            .into_iter()
            .map(|(tag, _)| tag)
            .collect();
        assert_eq!(tags, vec!["INFO", "CMD", "SUCCESS"]);
    }

    #[test]
    fn test_poisoned_lock_still_records() {
        let sink = MemorySink::new();
        let log = EventLog::new(sink.clone(), false);
        let poisoner = log.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.sink.lock();
            panic!("poison the event log lock");
        })
        .join();
        assert!(log.sink.is_poisoned());

        log.warn("still recorded");
        assert_eq!(
            sink.entries(),
            vec![("WARN".to_string(), "still recorded".to_string())]
        );
    }

    #[test]
    fn test_parse_entry_rejects_garbage() {
        assert!(parse_entry("no brackets").is_none());
        assert!(parse_entry("[ts] missing colon").is_none());
        assert_eq!(
            parse_entry("[2026-10-16 09:12:44] SER: uart:~$ "),
            Some(("SER".to_string(), "uart:~$ ".to_string()))
        );
    }

    #[test]
    fn test_tag_names() {
        let tags = [
            (Tag::Cmd, "CMD"),
            (Tag::Ser, "SER"),
            (Tag::Run, "RUN"),
            (Tag::Out, "OUT"),
            (Tag::Rc, "RC"),
            (Tag::Warn, "WARN"),
            (Tag::Error, "ERROR"),
        ];
        for (tag, name) in tags {
            assert_eq!(tag.to_string(), name);
        }
    }
}
