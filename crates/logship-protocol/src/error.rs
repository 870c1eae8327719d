//! Error types for the wire protocol

use thiserror::Error;

/// Result type alias using protocol Error
pub type Result<T> = std::result::Result<T, Error>;

/// Wire protocol error types
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from stream read/write
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failures
    #[error("Codec error: {0}")]
    Codec(String),

    /// Frame checksum mismatch
    #[error("CRC mismatch: expected {expected:x}, got {actual:x}")]
    Crc {
        /// Checksum carried by the frame
        expected: u32,
        /// Checksum computed over the received bytes
        actual: u32,
    },

    /// Frame shorter than the fixed header + trailer
    #[error("Frame too short: {0} bytes")]
    Truncated(usize),

    /// Unrecognized message kind byte
    #[error("Unknown message kind: {0:#x}")]
    UnknownKind(u8),
}

impl Error {
    /// Create a codec error
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }
}
