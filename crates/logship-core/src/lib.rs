//! Logship Core - site-to-site log replication engine
//!
//! Replicates an append-only log from a primary site to a backup site
//! over a network that may reorder, duplicate, or drop messages. Two
//! sync modes are supported: snapshot sync (one-time full transfer of
//! all stream contents up to a fixed log position) and log-entry sync
//! (ongoing incremental transfer of newly appended entries).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   wire messages    ┌──────────────────┐
//! │  SnapshotReader  │ ─────────────────► │    SinkBuffer    │
//! │  (sending site)  │                    │ (receiving site) │
//! │                  │ ◄───────────────── │                  │
//! └────────┬─────────┘       acks         └────────┬─────────┘
//!          │ reads                                  │ applies, in
//!          ▼                                        ▼ chain order
//!    SourceLog (backing log)                  downstream applier
//! ```
//!
//! The sender partitions a fixed set of source streams into a strictly
//! ordered sequence of bounded messages; the receiver buffers whatever
//! arrives out of order and releases it downstream strictly in chain
//! order, acknowledging the highest contiguous position on a bounded
//! cadence so the sender can detect loss and apply backpressure.
//!
//! Both engines are single-threaded per session by contract; see the
//! [`sync`] module for details.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod source;
pub mod sync;

pub use error::{Error, Result};
