//! Line Framing
//!
//! TCP delivers bytes, not messages. The framer accumulates reads and
//! yields complete newline-terminated lines; a trailing partial line
//! stays buffered until more bytes arrive. Lines are raw bytes: text
//! decoding belongs to the protocol.

use thiserror::Error;

/// Framing errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// A line grew past the configured limit.
    #[error("Line exceeds {limit} bytes")]
    LineTooLong {
        /// Configured limit
        limit: usize,
    },
}

/// Accumulation buffer for newline-delimited messages.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line: Option<usize>,
}

impl LineFramer {
    /// Create an unbounded framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a framer that rejects lines longer than `max_line` bytes.
    pub fn with_limit(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line: Some(max_line),
        }
    }

    fn check(&self, len: usize) -> Result<(), FramingError> {
        match self.max_line {
            Some(limit) if len > limit => Err(FramingError::LineTooLong { limit }),
            _ => Ok(()),
        }
    }

    /// Append bytes and drain every complete line.
    ///
    /// Lines come back in arrival order without the terminator. A trailing
    /// `\r` is stripped and empty lines are skipped. Fails if a complete
    /// line or the held partial line is over the limit.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, FramingError> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let mut line = &self.buffer[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            self.check(line.len())?;
            if !line.is_empty() {
                lines.push(line.to_vec());
            }
            start = end + 1;
        }
        self.buffer.drain(..start);
        self.check(self.buffer.len())?;

        Ok(lines)
    }

    /// Bytes held for an incomplete line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
