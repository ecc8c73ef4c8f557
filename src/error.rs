//! Typed failures for the capture/convert/persist pipeline.
//!
//! The binary wraps these in `anyhow` for context, but the pipeline keeps them
//! distinct so callers can tell a device problem from a contract violation.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Device resolution or stream setup failed before any frame was captured.
    Setup(String),
    /// The converter was handed a non-float input or a non-integer target.
    InvalidInputKind(String),
    /// Persisting the finished session failed.
    Write(String),
}

impl RecordError {
    pub fn label(&self) -> &'static str {
        match self {
            RecordError::Setup(_) => "setup_failure",
            RecordError::InvalidInputKind(_) => "invalid_input_kind",
            RecordError::Write(_) => "write_failure",
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Setup(msg) => write!(f, "audio setup failed: {msg}"),
            RecordError::InvalidInputKind(msg) => write!(f, "invalid sample kind: {msg}"),
            RecordError::Write(msg) => write!(f, "failed to write recording: {msg}"),
        }
    }
}

impl std::error::Error for RecordError {}

impl From<hound::Error> for RecordError {
    fn from(err: hound::Error) -> Self {
        RecordError::Write(err.to_string())
    }
}

impl From<std::io::Error> for RecordError {
    fn from(err: std::io::Error) -> Self {
        RecordError::Write(err.to_string())
    }
}
