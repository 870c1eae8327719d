//! Source log seam
//!
//! The replication core reads from the backing log through the
//! [`SourceLog`] trait: ordered iteration over a named stream, bounded
//! by an upper log position. Data compacted away must surface as
//! [`Error::Trimmed`] so a sync session can be abandoned rather than
//! silently skipping a range.
//!
//! [`MemoryLog`] is an in-process implementation backing the test
//! suite and small deployments that replicate from a resident log.

use crate::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use logship_protocol::NON_POSITION;

/// One versioned record read from a source stream. The payload bytes
/// are opaque to the replication core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueRecord {
    /// Log position at which the record was appended
    pub version: i64,
    /// Opaque record bytes
    pub data: Vec<u8>,
}

/// Ordered record iterator over one stream, bounded by a log position
pub type RecordIter = Box<dyn Iterator<Item = Result<OpaqueRecord>> + Send>;

/// Read access to the backing replicated log
pub trait SourceLog: Send + Sync {
    /// Highest log position written so far, or [`NON_POSITION`] for an
    /// empty log. A snapshot sync fixes its boundary here.
    fn log_tail(&self) -> i64;

    /// Open an ordered iterator over `stream`'s records up to and
    /// including `boundary`. Iteration yields [`Error::Trimmed`] if a
    /// needed prefix has been compacted away.
    fn stream_up_to(&self, stream: &str, boundary: i64) -> Result<RecordIter>;
}

/// Per-stream state inside [`MemoryLog`]
#[derive(Debug, Default)]
struct StreamState {
    records: Vec<OpaqueRecord>,
    /// Set once a trim removed records from this stream; full-prefix
    /// reads are unrecoverable from then on
    trimmed: bool,
}

#[derive(Debug, Default)]
struct MemoryLogInner {
    streams: BTreeMap<String, StreamState>,
    tail: i64,
}

/// In-memory source log with a single global position space shared by
/// all streams
#[derive(Debug)]
pub struct MemoryLog {
    inner: RwLock<MemoryLogInner>,
}

impl MemoryLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryLogInner {
                streams: BTreeMap::new(),
                tail: NON_POSITION,
            }),
        }
    }

    /// Append a record to `stream`, returning its assigned position
    pub fn append(&self, stream: &str, data: Vec<u8>) -> i64 {
        let mut inner = self.inner.write();
        inner.tail += 1;
        let version = inner.tail;
        inner
            .streams
            .entry(stream.to_string())
            .or_default()
            .records
            .push(OpaqueRecord { version, data });
        version
    }

    /// Compact away all records at or below `up_to`. Streams that lose
    /// records are marked; later full reads of them fail with
    /// [`Error::Trimmed`].
    pub fn trim(&self, up_to: i64) {
        let mut inner = self.inner.write();
        for state in inner.streams.values_mut() {
            let before = state.records.len();
            state.records.retain(|r| r.version > up_to);
            if state.records.len() != before {
                state.trimmed = true;
            }
        }
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceLog for MemoryLog {
    fn log_tail(&self) -> i64 {
        self.inner.read().tail
    }

    fn stream_up_to(&self, stream: &str, boundary: i64) -> Result<RecordIter> {
        let inner = self.inner.read();
        let Some(state) = inner.streams.get(stream) else {
            return Ok(Box::new(std::iter::empty()));
        };
        if state.trimmed {
            let err = Error::trimmed(stream, boundary);
            return Ok(Box::new(std::iter::once(Err(err))));
        }
        let records: Vec<OpaqueRecord> = state
            .records
            .iter()
            .filter(|r| r.version <= boundary)
            .cloned()
            .collect();
        Ok(Box::new(records.into_iter().map(Ok)))
    }
}
