//! Replication sync engines
//!
//! Two components form the core, connected only by the wire metadata
//! contract in `logship-protocol`:
//!
//! - [`SnapshotReader`] (sending site): iterates a fixed,
//!   deterministically-ordered set of source streams, reads bounded
//!   batches up to the snapshot boundary, and emits a strictly ordered
//!   sequence of messages carrying chaining metadata.
//! - [`SinkBuffer`] (receiving site): buffers out-of-order arrivals,
//!   delivers downstream strictly in chain order, and acknowledges the
//!   highest contiguous position on a bounded cadence.
//!
//! # Concurrency
//!
//! Both engines are built for single-threaded, single-session use: one
//! task drives `receive` and one drives `next` per session. They hold
//! no locks; concurrent mutation from multiple callers is a
//! session-management bug at the call site, and adding synchronization
//! here would only mask it.

pub mod config;
pub mod session;
pub mod sink;
pub mod snapshot_reader;

pub use config::SyncConfig;
pub use session::{SinkSession, SourceSession, SyncEvent, SyncEventType};
pub use sink::{AckCallback, ApplyCallback, SinkBuffer};
pub use snapshot_reader::{SnapshotBatch, SnapshotReader};

/// Default number of received messages between acknowledgments
pub const DEFAULT_ACK_ENTRY_THRESHOLD: u32 = 16;

/// Default wall-clock bound on acknowledgment latency, in milliseconds
pub const DEFAULT_ACK_TIME_MS: u64 = 500;

/// Default maximum records per snapshot message. Bounds message size,
/// trading fewer round trips against larger buffers.
pub const DEFAULT_SNAPSHOT_BATCH_SIZE: usize = 32;
