//! Reassembly and acknowledgment engine (receiving site)
//!
//! The network may deliver messages out of order, duplicated, or not
//! at all. [`SinkBuffer`] withholds whatever arrives ahead of its
//! predecessor, keyed by the chaining value each message carries, and
//! releases messages downstream strictly in chain order. For snapshot
//! sync the chain is the session-wide sequence number; for log-entry
//! sync each message points at the timestamp of its predecessor, so
//! the receiver knows exactly which message is missing, not merely
//! that a gap exists.
//!
//! Acknowledgments are emitted on a bounded cadence (message count or
//! wall-clock time, whichever fires first) and always report the
//! highest position delivered with no gap before it — never a position
//! that is merely buffered. Acks keep flowing while gaps are
//! outstanding so the sender learns the buffer is stalled rather than
//! reading silence as success.

use crate::sync::SyncConfig;
use crate::Result;
use logship_protocol::{MessageKind, SyncEntry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Callback invoked exactly once per delivered message, in chain order
pub type ApplyCallback = Arc<dyn Fn(SyncEntry) -> Result<()> + Send + Sync>;

/// Callback that sends an acknowledgment back to the sending site
pub type AckCallback = Arc<dyn Fn(SyncEntry) -> Result<()> + Send + Sync>;

/// Out-of-order reassembly buffer with acknowledgment cadence
pub struct SinkBuffer {
    /// Data kind this session expects; anything else data-kind is a
    /// protocol mismatch
    kind: MessageKind,
    /// Sync session the buffer belongs to
    sync_request_id: Uuid,
    /// Fixed upper log position of the session, echoed in acks
    snapshot_boundary: i64,
    /// Chaining key of the next deliverable message
    next_key: i64,
    /// Withheld messages, keyed by chaining key
    buffer: HashMap<i64, SyncEntry>,
    /// Messages received since the last ack
    entries_since_ack: u32,
    /// When the last ack was sent
    last_ack: Instant,
    /// Count trigger for acks
    ack_entry_threshold: u32,
    /// Time trigger for acks
    ack_time_threshold: Duration,
    /// Downstream applier
    apply: ApplyCallback,
    /// Ack transport
    send_ack: AckCallback,
}

impl SinkBuffer {
    /// Create a fresh buffer for one sync session. `next_key` is the
    /// first expected chaining key: 0 for a snapshot sync, the base
    /// log position for a log-entry sync.
    pub fn new(
        kind: MessageKind,
        sync_request_id: Uuid,
        snapshot_boundary: i64,
        next_key: i64,
        config: &SyncConfig,
        apply: ApplyCallback,
        send_ack: AckCallback,
    ) -> Self {
        Self {
            kind,
            sync_request_id,
            snapshot_boundary,
            next_key,
            buffer: HashMap::new(),
            entries_since_ack: 0,
            last_ack: Instant::now(),
            ack_entry_threshold: config.ack_entry_threshold,
            ack_time_threshold: config.ack_time_threshold,
            apply,
            send_ack,
        }
    }

    /// Consume one raw message from the transport.
    ///
    /// Undecodable frames are dropped with a warning; they are never
    /// fatal to the session.
    pub fn receive(&mut self, raw: &[u8]) -> Result<()> {
        let entry = match SyncEntry::decode(raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("dropping undecodable message: {}", e);
                return Ok(());
            }
        };
        self.process(entry)
    }

    /// Consume one decoded message.
    ///
    /// Ack and control kinds carry no reordering risk at this layer
    /// and are forwarded unbuffered. Data kinds of the wrong mode, or
    /// belonging to another sync session, are dropped with a warning.
    /// Everything else is delivered in chain order, via the buffer
    /// when it arrives early.
    pub fn process(&mut self, entry: SyncEntry) -> Result<()> {
        let kind = entry.metadata.kind;

        if kind.is_ack() || kind.is_control() {
            return (self.apply)(entry);
        }

        if kind != self.kind {
            tracing::warn!(
                "got {:?} message but session expects {:?}",
                kind,
                self.kind
            );
            return Ok(());
        }

        // Late deliveries from a cancelled session can carry keys the
        // new session is waiting for; they must never slot in
        if entry.metadata.sync_request_id != self.sync_request_id {
            tracing::warn!(
                "dropping message from stale sync session {}",
                entry.metadata.sync_request_id
            );
            return Ok(());
        }

        let Some(key) = entry.metadata.chaining_key() else {
            tracing::warn!("data message without chaining key: {:?}", entry.metadata);
            return Ok(());
        };

        if key == self.next_key {
            let advanced = entry.metadata.delivered_key();
            (self.apply)(entry)?;
            if let Some(next) = advanced {
                self.next_key = next;
            }
            self.drain()?;
        } else {
            // A duplicate arrival simply overwrites its buffered twin
            self.buffer.insert(key, entry);
        }

        if self.should_ack() {
            match SyncEntry::ack(
                self.kind,
                self.sync_request_id,
                self.ack_position(),
                self.snapshot_boundary,
            ) {
                Some(ack) => (self.send_ack)(ack)?,
                None => tracing::warn!("no ack variant for session kind {:?}", self.kind),
            }
        }

        Ok(())
    }

    /// Deliver buffered messages while the chain stays unbroken
    fn drain(&mut self) -> Result<()> {
        while let Some(entry) = self.buffer.remove(&self.next_key) {
            let advanced = entry.metadata.delivered_key();
            (self.apply)(entry)?;
            match advanced {
                Some(next) => self.next_key = next,
                None => break,
            }
        }
        Ok(())
    }

    /// Ack cadence: fire on every `ack_entry_threshold` messages, or
    /// once `ack_time_threshold` has elapsed since the last ack.
    /// Evaluated on every data-kind receive, delivered or buffered.
    fn should_ack(&mut self) -> bool {
        self.entries_since_ack += 1;
        let now = Instant::now();
        if self.entries_since_ack >= self.ack_entry_threshold
            || now.duration_since(self.last_ack) >= self.ack_time_threshold
        {
            self.entries_since_ack = 0;
            self.last_ack = now;
            return true;
        }
        false
    }

    /// Highest contiguous delivered position: `next_key - 1` for
    /// snapshot sync (sequence numbers), `next_key` for log-entry sync
    /// (the timestamp of the last delivered entry).
    fn ack_position(&self) -> i64 {
        match self.kind {
            MessageKind::Snapshot => self.next_key - 1,
            _ => self.next_key,
        }
    }

    /// Chaining key the buffer expects next
    pub fn next_key(&self) -> i64 {
        self.next_key
    }

    /// Number of messages currently withheld
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
