//! Outbound events delivered from a session to its client.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Prefix that marks stderr output and error notices on the wire.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Which process output stream a line came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StreamTag {
    /// Process standard output.
    Stdout,
    /// Process standard error.
    Stderr,
}

impl Display for StreamTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// A single message on a session's outbound channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "text")]
pub enum OutboundEvent {
    /// One line of process stdout.
    Stdout(String),
    /// One line of process stderr.
    Stderr(String),
    /// Informational control notice (e.g., forced termination).
    Info(String),
    /// User-visible fault report.
    Error(String),
    /// Process terminated with the given exit code.
    Finished(i32),
}

impl OutboundEvent {
    /// Build a line event for the given stream.
    #[must_use]
    pub fn line(tag: StreamTag, line: String) -> Self {
        match tag {
            StreamTag::Stdout => Self::Stdout(line),
            StreamTag::Stderr => Self::Stderr(line),
        }
    }

    /// Notice sent when a flagged program is killed after the bounded wait.
    #[must_use]
    pub fn timed_out(timeout_seconds: u64) -> Self {
        Self::Info(format!(
            "Program timed out after {timeout_seconds} seconds and was terminated \
             (suspected GUI or long-running application)."
        ))
    }

    /// Plain-text rendering used by line-oriented transports.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Stdout(line) | Self::Info(line) => line.clone(),
            Self::Stderr(line) | Self::Error(line) => format!("{ERROR_PREFIX}{line}"),
            Self::Finished(code) => format!("Program finished with exit code: {code}"),
        }
    }
}

/// Sending half of a session's outbound channel.
pub type EventSink = tokio::sync::mpsc::Sender<OutboundEvent>;
