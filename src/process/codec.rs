//! Line codec for process console output.
//!
//! Console programs write arbitrary bytes, not guaranteed UTF-8, and may use
//! `\r\n` line endings. Lines are decoded lossily and stripped of their
//! terminator. A bounded line length keeps a program that never prints a
//! newline from growing the read buffer without limit.
//!
//! # Usage
//!
//! Wrap a child output handle in [`tokio_util::codec::FramedRead`] with
//! [`ConsoleLineCodec`]; each item is one line without its terminator.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Maximum line length accepted from a process stream: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited, lossy UTF-8 decoder for child stdout/stderr.
///
/// # Decoder
///
/// Invalid UTF-8 is replaced with `U+FFFD` rather than rejected. A line
/// longer than the configured limit is an [`io::ErrorKind::InvalidData`]
/// error whose message starts with `"line too long"`. At end of stream a
/// trailing unterminated line (such as a prompt) is still emitted.
///
/// # Examples
///
/// ```rust,ignore
/// use tokio_util::codec::FramedRead;
/// use exec_console::process::codec::ConsoleLineCodec;
///
/// let lines = FramedRead::new(child_stdout, ConsoleLineCodec::new());
/// ```
#[derive(Debug)]
pub struct ConsoleLineCodec {
    max_length: usize,
    /// Bytes of the buffer already scanned for `\n`.
    next_index: usize,
}

impl ConsoleLineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line limit.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }

    fn too_long(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line too long: exceeded {} bytes", self.max_length),
        )
    }
}

impl Default for ConsoleLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ConsoleLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        let start = self.next_index.min(src.len());
        if let Some(offset) = src[start..].iter().position(|b| *b == b'\n') {
            let newline = start + offset;
            self.next_index = 0;
            if newline > self.max_length {
                return Err(self.too_long());
            }
            let mut line = src.split_to(newline + 1);
            line.truncate(newline);
            return Ok(Some(into_text(&line)));
        }

        if src.len() > self.max_length {
            return Err(self.too_long());
        }
        self.next_index = src.len();
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split_to(src.len());
        Ok(Some(into_text(&rest)))
    }
}

// ── Private helper ────────────────────────────────────────────────────────────

fn into_text(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
