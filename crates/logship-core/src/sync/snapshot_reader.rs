//! Ordered snapshot sequencer (sending site)
//!
//! A snapshot sync transfers every configured stream as it existed at a
//! single log position, the snapshot boundary. [`SnapshotReader`] walks
//! the streams one at a time in lexicographic name order, reads bounded
//! record batches, and stamps each outgoing message with a session-wide
//! sequence number. The receiving site reassembles purely from that
//! sequence, so two runs over the same log state must emit identical
//! message streams.
//!
//! The final message of each stream carries the boundary itself as its
//! timestamp instead of the highest record version seen. That tells the
//! receiver the stream is complete up to the boundary even when the
//! stream's last record sits well below it.

use crate::source::{OpaqueRecord, SourceLog};
use crate::sync::SyncConfig;
use crate::{Error, Result};
use logship_protocol::{MessageKind, SyncEntry, SyncMetadata, NON_POSITION};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::iter::Peekable;
use std::sync::Arc;
use uuid::Uuid;

/// One sequencer step: at most one outgoing message, plus whether the
/// session has produced its last data message
#[derive(Debug)]
pub struct SnapshotBatch {
    /// The message to send, or `None` once the session is drained
    pub entry: Option<SyncEntry>,
    /// True when no further data messages will follow
    pub end_of_sync: bool,
}

/// Read state for the stream currently being transferred
struct StreamCursor {
    stream: String,
    iter: Peekable<crate::source::RecordIter>,
    /// Highest record version read from this stream so far
    max_version: i64,
}

/// Deterministic snapshot sequencer over a set of source streams
pub struct SnapshotReader {
    source: Arc<dyn SourceLog>,
    /// Stream names still waiting to be transferred, smallest name first
    queue: BinaryHeap<Reverse<String>>,
    current: Option<StreamCursor>,
    batch_size: usize,
    /// Fixed upper log position of this session
    boundary: i64,
    sync_request_id: Uuid,
    /// Next session-wide sequence number to assign
    sequence: u64,
    /// Timestamp of the previously emitted message, for chaining
    previous_timestamp: i64,
}

impl SnapshotReader {
    /// Create a sequencer for one snapshot sync session, fixed at the
    /// given boundary.
    pub fn new(source: Arc<dyn SourceLog>, config: &SyncConfig, boundary: i64) -> Self {
        Self {
            source,
            queue: config.streams.iter().cloned().map(Reverse).collect(),
            current: None,
            batch_size: config.snapshot_batch_size,
            boundary,
            sync_request_id: Uuid::new_v4(),
            sequence: 0,
            previous_timestamp: NON_POSITION,
        }
    }

    fn load_queue(&mut self, streams: &[String]) {
        self.queue = streams.iter().cloned().map(Reverse).collect();
    }

    /// Identifier of the current sync session
    pub fn sync_request_id(&self) -> Uuid {
        self.sync_request_id
    }

    /// Snapshot boundary of the current sync session
    pub fn boundary(&self) -> i64 {
        self.boundary
    }

    /// Abandon the current session and start a fresh one over the
    /// given streams at the given boundary, under a new session id.
    pub fn reset(&mut self, streams: &[String], boundary: i64) {
        self.boundary = boundary;
        self.sync_request_id = Uuid::new_v4();
        self.sequence = 0;
        self.previous_timestamp = NON_POSITION;
        self.current = None;
        self.load_queue(streams);
        tracing::info!(
            "snapshot sync {} reset at boundary {}",
            self.sync_request_id,
            self.boundary
        );
    }

    /// Open the next non-empty stream, smallest name first. Returns
    /// false once every remaining stream is empty or consumed.
    fn advance_stream(&mut self) -> Result<bool> {
        while let Some(Reverse(stream)) = self.queue.pop() {
            let mut iter = self
                .source
                .stream_up_to(&stream, self.boundary)?
                .peekable();
            if iter.peek().is_none() {
                tracing::debug!("stream {} empty below boundary {}", stream, self.boundary);
                continue;
            }
            self.current = Some(StreamCursor {
                stream,
                iter,
                max_version: NON_POSITION,
            });
            return Ok(true);
        }
        Ok(false)
    }

    /// Produce the next outgoing message.
    ///
    /// Every call emits at most one data message carrying up to the
    /// configured batch size of records from the stream currently being
    /// transferred. A trim surfacing from the source is returned as-is;
    /// the session cannot continue past it.
    pub fn next(&mut self) -> Result<SnapshotBatch> {
        if self.current.is_none() && !self.advance_stream()? {
            return Ok(SnapshotBatch {
                entry: None,
                end_of_sync: true,
            });
        }

        let batch_size = self.batch_size;
        let Some(cursor) = self.current.as_mut() else {
            return Err(Error::internal("stream cursor missing after advance"));
        };

        let mut records: Vec<OpaqueRecord> = Vec::with_capacity(batch_size);
        while records.len() < batch_size {
            match cursor.iter.next() {
                Some(Ok(record)) => {
                    cursor.max_version = cursor.max_version.max(record.version);
                    records.push(record);
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        let exhausted = cursor.iter.peek().is_none();
        // On the stream's final batch the timestamp is forced to the
        // boundary, marking the stream complete up to it
        let timestamp = if exhausted {
            self.boundary
        } else {
            cursor.max_version
        };
        let stream = cursor.stream.clone();

        if exhausted {
            tracing::debug!(
                "stream {} transferred through sequence {}",
                stream,
                self.sequence
            );
            self.current = None;
        }

        let payload = bincode::serialize(&records)
            .map_err(|e| Error::internal(format!("record batch encode failed: {}", e)))?;

        let metadata = SyncMetadata {
            kind: MessageKind::Snapshot,
            sync_request_id: self.sync_request_id,
            timestamp,
            previous_timestamp: self.previous_timestamp,
            snapshot_boundary: self.boundary,
            sequence: self.sequence,
        };
        self.sequence += 1;
        self.previous_timestamp = timestamp;

        let end_of_sync = if self.current.is_none() {
            !self.advance_stream()?
        } else {
            false
        };

        Ok(SnapshotBatch {
            entry: Some(SyncEntry::new(metadata, payload)),
            end_of_sync,
        })
    }
}
