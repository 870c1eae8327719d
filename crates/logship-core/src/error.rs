//! Error types for Logship Core

use thiserror::Error;

/// Result type alias using Logship Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the replication engine
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from the backing log or transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire protocol errors (framing, checksum, unknown kinds)
    #[error("Protocol error: {0}")]
    Protocol(#[from] logship_protocol::Error),

    /// Requested log data has been compacted away. Fatal to the
    /// current sync session; the controller must restart with a fresh
    /// snapshot boundary.
    #[error("Stream {stream} trimmed below position {position}")]
    Trimmed {
        /// Stream whose prefix is no longer available
        stream: String,
        /// Position the session still needed
        position: i64,
    },

    /// Source log read failures other than trims
    #[error("Source log error: {0}")]
    SourceLog(String),

    /// Session lifecycle misuse (e.g. pumping without an active sync)
    #[error("Session error: {0}")]
    Session(String),

    /// Downstream applier failures
    #[error("Apply error: {0}")]
    Apply(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a trimmed error
    pub fn trimmed(stream: impl Into<String>, position: i64) -> Self {
        Self::Trimmed {
            stream: stream.into(),
            position,
        }
    }

    /// Create a source log error
    pub fn source_log(msg: impl Into<String>) -> Self {
        Self::SourceLog(msg.into())
    }

    /// Create a session error
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create an apply error
    pub fn apply(msg: impl Into<String>) -> Self {
        Self::Apply(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is fatal to the current sync session
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(self, Self::Trimmed { .. } | Self::SourceLog(_))
    }
}
