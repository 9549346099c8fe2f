//! Error types for the conversation-history subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// History subsystem error type.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Session identifier rejected by validation.
    #[error("invalid session id: {0}")]
    InvalidSessionId(#[from] crate::history::core::ids::SessionKeyError),
    /// Turn rejected before it reached the log.
    #[error("invalid turn: {0}")]
    InvalidTurn(String),
    /// Durable write failed; the in-memory log is still valid.
    #[error("failed to persist history to {}: {source}", path.display())]
    Persistence {
        /// Target file of the failed write.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HistoryError {
    /// Whether this error came from a failed durable write.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

/// Convenience result alias for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Reasons a stored record could not be loaded.
///
/// Never surfaced to callers: every variant degrades to a fresh log.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No record on disk yet.
    #[error("no stored history")]
    Missing,
    /// The file exists but could not be read.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    /// The file contents are not a valid record.
    #[error("parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}
