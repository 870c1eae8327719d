//! Logship Protocol - wire message model for site-to-site log replication
//!
//! The sending and receiving sites share no process state; this crate is
//! the contract between them:
//! - Message kinds (snapshot / log-entry data, acks, control)
//! - Per-message metadata carrying the chaining key the receiver uses to
//!   rebuild a strict delivery order from out-of-order arrivals
//! - Binary framing with CRC32 validation
//!
//! # Wire Format
//!
//! All messages use bincode serialization with CRC32 validation:
//!
//! ```text
//! [kind:1][length:4][payload:N][crc32:4]
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod entry;
pub mod error;
pub mod wire;

pub use entry::{MessageKind, SyncEntry, SyncMetadata, NON_POSITION};
pub use error::{Error, Result};
