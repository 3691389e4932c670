//! External process execution with streamed, logged output.
//!
//! The flashing tool's exit code is advisory: some OpenOCD versions exit
//! non-zero after the reset pulse even though programming succeeded. The
//! runner only reports the code; deciding what it means is the caller's job.

use {
    crate::{
        error::{Error, Result},
        event_log::{EventLog, Tag},
        text::drain_utf8_escaped,
    },
    log::debug,
    std::{
        fmt::Write as _,
        io::{self, BufRead, BufReader, Read},
        path::Path,
        process::{Command, ExitStatus, Stdio},
    },
};

/// Runs an external command to completion.
pub trait ProcessRunner {
    /// Run `argv` (program first) in `cwd` and return its exit code.
    fn run(&mut self, argv: &[String], cwd: Option<&Path>) -> Result<i32>;
}

/// [`ProcessRunner`] spawning real child processes.
///
/// Logs `RUN` with the command line, one `OUT` entry per line of output as
/// it arrives, then `RC` with the exit code. stdout and stderr share one
/// pipe, so their lines keep the order the child wrote them in.
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    log: EventLog,
}

impl SubprocessRunner {
    /// Create a runner logging to `log`.
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl ProcessRunner for SubprocessRunner {
    fn run(&mut self, argv: &[String], cwd: Option<&Path>) -> Result<i32> {
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::Spawn {
                program: String::new(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty command line"),
            });
        };

        self.log
            .record(Tag::Run, &argv.join(" "));

        let (output, output_writer) = io::pipe()?;
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(output_writer.try_clone()?)
            .stderr(output_writer);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let spawned = command.spawn();
        // The parent's write ends live in `command`; the read only ends once
        // they are closed
        drop(command);
        let mut child = spawned.map_err(|source| Error::Spawn {
            program: program.clone(),
            source,
        })?;

        pump_lines(output, &self.log);

        let status = child.wait()?;
        let code = exit_code(status);
        self.log
            .record(Tag::Rc, &code.to_string());
        Ok(code)
    }
}

/// Log every line read from `reader` as an `OUT` entry.
fn pump_lines(reader: impl Read, log: &EventLog) {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                let mut text = drain_utf8_escaped(&mut line);
                // A line never continues, so a dangling UTF-8 prefix is escaped too
                for byte in &line {
                    let _ = write!(text, "\\x{byte:02x}");
                }
                log.record(Tag::Out, text.trim_end());
            },
            Err(e) => {
                debug!("Output pipe read failed: {e}");
                break;
            },
        }
    }
}

/// Exit code, or the negated signal number when killed by a signal.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
