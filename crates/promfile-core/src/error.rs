//! Shared error type across promfile crates.

use std::path::PathBuf;

use thiserror::Error;

/// Stable error codes for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Backing file could not be opened, read or written.
    Io,
    /// A single exposition line failed the grammar.
    Parse,
    /// Update command violated its contract.
    InvalidCommand,
    /// Invalid configuration.
    Config,
}

impl ErrorCode {
    /// String representation used in logs and HTTP responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Io => "IO_ERROR",
            ErrorCode::Parse => "PARSE_ERROR",
            ErrorCode::InvalidCommand => "INVALID_COMMAND",
            ErrorCode::Config => "CONFIG_ERROR",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PromFileError>;

/// Unified error type used by core and exporter.
#[derive(Debug, Error)]
pub enum PromFileError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("config: {0}")]
    Config(String),
}

impl PromFileError {
    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            PromFileError::Io { .. } => ErrorCode::Io,
            PromFileError::Parse { .. } => ErrorCode::Parse,
            PromFileError::InvalidCommand(_) => ErrorCode::InvalidCommand,
            PromFileError::Config(_) => ErrorCode::Config,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PromFileError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        PromFileError::Parse {
            line,
            reason: reason.into(),
        }
    }
}
