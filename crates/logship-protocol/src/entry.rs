//! Message kinds and metadata
//!
//! Every wire message is self-describing: its metadata carries the
//! chaining key the receiving site needs to slot the message into the
//! session's total order, the fixed snapshot boundary of the session,
//! and the sync-request id grouping one sequencer run.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel log position meaning "no predecessor" / "not a position".
///
/// The first message of a session chains to this marker; ack messages
/// carry it in `previous_timestamp`.
pub const NON_POSITION: i64 = -1;

/// Wire message kinds
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Snapshot-sync data message, ordered by session-wide sequence number
    Snapshot = 0x01,
    /// Acknowledgment of snapshot-sync progress
    SnapshotAck = 0x02,
    /// Control: snapshot sync is starting (pass-through, never buffered)
    SnapshotStart = 0x03,
    /// Control: snapshot transfer finished (pass-through, never buffered)
    SnapshotComplete = 0x04,
    /// Log-entry-sync data message, chained by predecessor timestamp
    LogEntry = 0x10,
    /// Acknowledgment of log-entry-sync progress
    LogEntryAck = 0x11,
}

impl TryFrom<u8> for MessageKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Snapshot),
            0x02 => Ok(Self::SnapshotAck),
            0x03 => Ok(Self::SnapshotStart),
            0x04 => Ok(Self::SnapshotComplete),
            0x10 => Ok(Self::LogEntry),
            0x11 => Ok(Self::LogEntryAck),
            other => Err(Error::UnknownKind(other)),
        }
    }
}

impl MessageKind {
    /// Data kinds are subject to reordering and go through the
    /// reassembly buffer; everything else is forwarded as-is.
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Snapshot | Self::LogEntry)
    }

    /// Acknowledgment kinds
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::SnapshotAck | Self::LogEntryAck)
    }

    /// Control kinds carry no records and no reordering risk
    pub fn is_control(&self) -> bool {
        matches!(self, Self::SnapshotStart | Self::SnapshotComplete)
    }

    /// The ack kind answering this data kind, if any
    pub fn ack_kind(&self) -> Option<MessageKind> {
        match self {
            Self::Snapshot => Some(Self::SnapshotAck),
            Self::LogEntry => Some(Self::LogEntryAck),
            _ => None,
        }
    }
}

/// Metadata carried with every wire message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Message kind
    pub kind: MessageKind,
    /// Identifier of the sync session this message belongs to
    pub sync_request_id: Uuid,
    /// This message's position in the total order. For snapshot sync
    /// this is the originating stream's max record version (forced to
    /// the boundary on the stream's final batch); for log-entry sync
    /// it is the log position of the last record in the message. For
    /// acks it is the reported contiguous position.
    pub timestamp: i64,
    /// Chaining key for log-entry sync: the `timestamp` of the message
    /// that must be delivered immediately before this one, or
    /// [`NON_POSITION`] at the start of a session.
    pub previous_timestamp: i64,
    /// Fixed upper log position for the whole sync session
    pub snapshot_boundary: i64,
    /// Session-wide sequence number assigned by the sequencer in
    /// emission order, spanning all source streams. The chaining key
    /// for snapshot sync.
    pub sequence: u64,
}

impl SyncMetadata {
    /// The key under which the receiver expects (or withholds) this
    /// message: the sequence number for snapshot sync, the predecessor
    /// timestamp for log-entry sync. `None` for ack/control kinds,
    /// which are never buffered.
    pub fn chaining_key(&self) -> Option<i64> {
        match self.kind {
            MessageKind::Snapshot => Some(self.sequence as i64),
            MessageKind::LogEntry => Some(self.previous_timestamp),
            _ => None,
        }
    }

    /// The key the receiver expects next once this message has been
    /// delivered: `sequence + 1` for snapshot sync, this message's own
    /// `timestamp` for log-entry sync.
    pub fn delivered_key(&self) -> Option<i64> {
        match self.kind {
            MessageKind::Snapshot => Some(self.sequence as i64 + 1),
            MessageKind::LogEntry => Some(self.timestamp),
            _ => None,
        }
    }
}

/// A wire message: metadata plus an opaque serialized record batch.
///
/// The replication core never interprets the payload beyond counting
/// records for batching; its encoding belongs to the applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntry {
    /// Message metadata
    pub metadata: SyncMetadata,
    /// Opaque serialized record batch; empty for acks and control
    pub payload: Vec<u8>,
}

impl SyncEntry {
    /// Create a new entry
    pub fn new(metadata: SyncMetadata, payload: Vec<u8>) -> Self {
        Self { metadata, payload }
    }

    /// Build an acknowledgment answering a session of `session_kind`,
    /// reporting `position` as the highest contiguous delivered
    /// position. Returns `None` if `session_kind` has no ack variant.
    pub fn ack(
        session_kind: MessageKind,
        sync_request_id: Uuid,
        position: i64,
        snapshot_boundary: i64,
    ) -> Option<Self> {
        let kind = session_kind.ack_kind()?;
        Some(Self {
            metadata: SyncMetadata {
                kind,
                sync_request_id,
                timestamp: position,
                previous_timestamp: NON_POSITION,
                snapshot_boundary,
                sequence: 0,
            },
            payload: Vec::new(),
        })
    }
}
