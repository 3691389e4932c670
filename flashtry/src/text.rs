//! Decoding of console bytes into loggable text.

use std::fmt::Write as _;

/// Drain buffered bytes into text without stalling on invalid bytes.
///
/// - Valid UTF-8 is emitted as-is.
/// - Invalid byte sequences are emitted as `\xNN` escapes and decoding
///   continues after them.
/// - An incomplete UTF-8 suffix is kept in `buffer` for the next read.
pub fn drain_utf8_escaped(buffer: &mut Vec<u8>) -> String {
    let mut output = String::new();

    loop {
        match std::str::from_utf8(buffer) {
            Ok(valid) => {
                output.push_str(valid);
                buffer.clear();
                break;
            },
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                if valid_up_to > 0 {
                    if let Ok(valid) = std::str::from_utf8(&buffer[..valid_up_to]) {
                        output.push_str(valid);
                    }
                }

                match err.error_len() {
                    Some(invalid_len) => {
                        let drain_to = valid_up_to
                            .saturating_add(invalid_len)
                            .min(buffer.len());
                        for byte in &buffer[valid_up_to..drain_to] {
                            let _ = write!(output, "\\x{byte:02x}");
                        }
                        buffer.drain(..drain_to);
                    },
                    None => {
                        if valid_up_to > 0 {
                            buffer.drain(..valid_up_to);
                        }
                        break;
                    },
                }
            },
        }
    }

    output
}

/// Split text into lines on `\r\n`, `\n` or a lone `\r`.
///
/// Terminators are not included. A trailing terminator does not produce an
/// empty final line, but blank lines in the middle are kept.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            },
            b'\r' => {
                lines.push(&text[start..i]);
                i += 1;
                if bytes.get(i) == Some(&b'\n') {
                    i += 1;
                }
                start = i;
            },
            _ => i += 1,
        }
    }

    if start < bytes.len() {
        lines.push(&text[start..]);
    }

    lines
}

/// Reassembles physical lines from text arriving in arbitrary chunks.
///
/// A line ends at `\n`, `\r\n` or a lone `\r`, also when the `\r` and the
/// `\n` arrive in different chunks.
#[derive(Debug, Default)]
pub struct LineAssembler {
    partial: String,
    after_cr: bool,
}

impl LineAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and return every line it completed.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for ch in text.chars() {
            match ch {
                '\n' if self.after_cr => self.after_cr = false,
                '\n' | '\r' => {
                    lines.push(std::mem::take(&mut self.partial));
                    self.after_cr = ch == '\r';
                },
                _ => {
                    self.after_cr = false;
                    self.partial.push(ch);
                },
            }
        }
        lines
    }

    /// Take the unterminated remainder, if any.
    pub fn flush(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.partial))
        }
    }

    /// Unterminated text held back so far.
    pub fn pending(&self) -> &str {
        &self.partial
    }
}

/// Keep only the last `max_chars` characters of `text`.
pub fn keep_tail(text: &mut String, max_chars: usize) {
    let count = text.chars().count();
    if count <= max_chars {
        return;
    }
    let cut = text
        .char_indices()
        .nth(count - max_chars)
        .map_or(text.len(), |(idx, _)| idx);
    text.drain(..cut);
}
