//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all session failure modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or I/O operation failure outside a session stream.
    Io(String),
    /// Artifact missing or unsuccessful, or the OS refused to spawn it.
    LaunchFailed(String),
    /// Writing to the process stdin failed (closed stream or exited process).
    WriteFailed(String),
    /// A pump hit an I/O error that is not a normal stream close.
    ReadFault(String),
    /// Attach carried no usable session id.
    SessionNotFound(String),
    /// No artifact descriptor is waiting under the requested id.
    ArtifactNotFound(String),
    /// A live process is already registered for the id.
    DoubleOpen(String),
    /// Compiler collaborator failure unrelated to the submitted source.
    Compile(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::LaunchFailed(msg) => write!(f, "launch failed: {msg}"),
            Self::WriteFailed(msg) => write!(f, "write failed: {msg}"),
            Self::ReadFault(msg) => write!(f, "read fault: {msg}"),
            Self::SessionNotFound(msg) => write!(f, "session not found: {msg}"),
            Self::ArtifactNotFound(msg) => write!(f, "artifact not found: {msg}"),
            Self::DoubleOpen(msg) => write!(f, "double open: {msg}"),
            Self::Compile(msg) => write!(f, "compile: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
