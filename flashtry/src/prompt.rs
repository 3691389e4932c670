//! Shell prompt recognition over an unframed byte stream.
//!
//! The console has no message framing: command echo, command output and
//! asynchronous log lines all arrive interleaved. The only completion signal
//! is the shell printing its prompt again (`uart:~$ `, `shell:~$ `, or a bare
//! `~$`). [`PromptDetector`] keeps a bounded tail of decoded text and reports
//! when a line of it looks like a prompt.
//!
//! A prompt marker echoed inside unrelated output is also a match. That gap
//! is known and kept so completion timing stays what existing log tooling
//! expects.

use crate::text::{drain_utf8_escaped, keep_tail, split_lines};

/// Marker every supported shell prompt ends with.
pub const PROMPT_MARKER: &str = "~$";

/// Maximum number of characters retained between feeds.
pub const MAX_TAIL_CHARS: usize = 256;

/// Whether `line` looks like a shell prompt.
///
/// Some shells print a space after the marker and some do not, so a line
/// matches if it ends with `~$` once trailing whitespace is trimmed, or
/// contains `~$ ` anywhere.
pub fn is_prompt_line(line: &str) -> bool {
    line.trim_end()
        .ends_with(PROMPT_MARKER)
        || line.contains("~$ ")
}

/// Result of feeding bytes to a [`PromptDetector`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    /// Newly decoded text, for logging.
    pub text: String,
    /// The first line recognised as a prompt, if any.
    pub prompt: Option<String>,
}

impl Detection {
    /// Whether a prompt was seen.
    pub fn matched(&self) -> bool {
        self.prompt.is_some()
    }
}

/// Stateful line buffer that spots the prompt reappearing.
#[derive(Debug, Default)]
pub struct PromptDetector {
    pending: Vec<u8>,
    tail: String,
}

impl PromptDetector {
    /// Create an empty detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, append them to the tail and test its lines in order.
    ///
    /// The first matching line wins and clears the tail. Otherwise the tail
    /// is cut back to the last [`MAX_TAIL_CHARS`] characters.
    pub fn feed(&mut self, bytes: &[u8]) -> Detection {
        self.pending
            .extend_from_slice(bytes);
        let text = drain_utf8_escaped(&mut self.pending);
        self.tail.push_str(&text);

        let prompt = split_lines(&self.tail)
            .into_iter()
            .find(|line| is_prompt_line(line))
            .map(str::to_string);

        if prompt.is_some() {
            self.tail.clear();
        } else {
            keep_tail(&mut self.tail, MAX_TAIL_CHARS);
        }

        Detection { text, prompt }
    }

    /// Forget buffered text, e.g. before a fresh wait.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.tail.clear();
    }

    /// Text currently retained.
    pub fn tail(&self) -> &str {
        &self.tail
    }
}
