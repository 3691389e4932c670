//! Scripted in-memory channels for tests.

use {
    crate::{
        error::{Error, Result},
        port::{Channel, Connector, SerialConfig},
    },
    std::{
        collections::{HashMap, VecDeque},
        sync::{Arc, Mutex},
        time::{Duration, Instant},
    },
};

/// A reply the device gives to a command, released after `delay`.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    pub delay: Duration,
    pub data: Vec<u8>,
}

impl Reply {
    pub fn now(data: impl AsRef<[u8]>) -> Self {
        Self::after(Duration::ZERO, data)
    }

    pub fn after(delay: Duration, data: impl AsRef<[u8]>) -> Self {
        Self {
            delay,
            data: data
                .as_ref()
                .to_vec(),
        }
    }
}

/// Channel replaying scripted device output.
///
/// Bytes queued with [`push`](Self::push) are handed out one chunk per read.
/// Each command line written to the channel releases the replies registered
/// for it with [`on_command`](Self::on_command).
pub(crate) struct ScriptedChannel {
    name: String,
    open: bool,
    inbound: VecDeque<(Instant, Vec<u8>)>,
    replies: HashMap<String, Vec<Reply>>,
    line: Vec<u8>,
    written: Arc<Mutex<Vec<u8>>>,
    closes: Arc<Mutex<usize>>,
}

impl ScriptedChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            open: true,
            inbound: VecDeque::new(),
            replies: HashMap::new(),
            line: Vec::new(),
            written: Arc::default(),
            closes: Arc::default(),
        }
    }

    /// Queue a chunk that is readable right away.
    pub fn push(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        self.inbound
            .push_back((Instant::now(), data.as_ref().to_vec()));
        self
    }

    /// Register replies for a command line (without terminator).
    pub fn on_command(&mut self, command: &str, replies: Vec<Reply>) -> &mut Self {
        self.replies
            .insert(command.to_string(), replies);
        self
    }

    /// Shared view of every byte written so far.
    pub fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.written)
    }

    /// Shared counter of `close` calls that actually closed the channel.
    pub fn closes(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.closes)
    }

    fn dispatch(&mut self, byte: u8) {
        if byte != b'\n' {
            self.line.push(byte);
            return;
        }
        let line = String::from_utf8_lossy(&self.line)
            .trim_end_matches('\r')
            .to_string();
        self.line.clear();

        if let Some(replies) = self.replies.get(&line) {
            let now = Instant::now();
            for reply in replies {
                self.inbound
                    .push_back((now + reply.delay, reply.data.clone()));
            }
        }
    }
}

impl Channel for ScriptedChannel {
    fn read_available(&mut self) -> Result<Vec<u8>> {
        if !self.open {
            return Ok(Vec::new());
        }
        let now = Instant::now();
        match self.inbound.front() {
            Some((ready_at, _)) if *ready_at <= now => Ok(self
                .inbound
                .pop_front()
                .map(|(_, data)| data)
                .unwrap_or_default()),
            _ => Ok(Vec::new()),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::Write(format!("{} is closed", self.name)));
        }
        self.written
            .lock()
            .map_err(|_| Error::Write("poisoned".to_string()))?
            .extend_from_slice(data);
        for &byte in data {
            self.dispatch(byte);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::Write(format!("{} is closed", self.name)))
        }
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            if let Ok(mut closes) = self.closes.lock() {
                *closes += 1;
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Connector handing out one prepared [`ScriptedChannel`].
pub(crate) struct ScriptedConnector {
    pub present: Vec<String>,
    pub channel: Option<ScriptedChannel>,
    pub opened: Vec<SerialConfig>,
}

impl ScriptedConnector {
    pub fn new(present: &[&str], channel: ScriptedChannel) -> Self {
        Self {
            present: present
                .iter()
                .map(ToString::to_string)
                .collect(),
            channel: Some(channel),
            opened: Vec::new(),
        }
    }
}

impl Connector for ScriptedConnector {
    type Channel = ScriptedChannel;

    fn exists(&self, path: &str) -> bool {
        self.present
            .iter()
            .any(|p| p == path)
    }

    fn open(&mut self, config: &SerialConfig) -> Result<Self::Channel> {
        self.opened
            .push(config.clone());
        if !self.exists(&config.port_name) {
            return Err(Error::Connection {
                path: config
                    .port_name
                    .clone(),
                reason: "No such file or directory".to_string(),
            });
        }
        self.channel
            .take()
            .ok_or_else(|| Error::Connection {
                path: config
                    .port_name
                    .clone(),
                reason: "Device or resource busy".to_string(),
            })
    }
}
