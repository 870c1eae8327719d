//! Sync session lifecycle
//!
//! [`SourceSession`] and [`SinkSession`] wrap the two engines with the
//! start / pump / cancel surface an external replication controller
//! drives. The controller owns transition legality (when a sync may
//! start, what follows a failure); the sessions only guarantee that a
//! cancel or restart leaves nothing behind from the previous run.
//!
//! [`SyncEvent`] is the vocabulary the controller speaks. Sessions
//! react to the events that mean "stop what you are doing" and ignore
//! the rest.

use crate::source::SourceLog;
use crate::sync::sink::{AckCallback, ApplyCallback, SinkBuffer};
use crate::sync::snapshot_reader::{SnapshotBatch, SnapshotReader};
use crate::sync::SyncConfig;
use crate::{Error, Result};
use logship_protocol::{MessageKind, NON_POSITION};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle events exchanged with the replication controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEventType {
    /// Replication towards this peer is starting
    ReplicationStart,
    /// Replication towards this peer is stopping
    ReplicationStop,
    /// A full snapshot sync has been requested
    SnapshotSyncRequest,
    /// The in-flight snapshot sync must be abandoned
    SnapshotSyncCancel,
    /// A trim was hit; the in-flight sync is unrecoverable
    TrimmedException,
    /// The snapshot transfer finished and was applied
    SnapshotSyncComplete,
}

/// A lifecycle event with a unique identity for dedup and tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Unique event id
    pub event_id: Uuid,
    /// What happened
    pub event_type: SyncEventType,
}

impl SyncEvent {
    /// Create an event with a fresh id
    pub fn new(event_type: SyncEventType) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
        }
    }
}

/// Sending-site session driving a [`SnapshotReader`]
pub struct SourceSession {
    source: Arc<dyn SourceLog>,
    config: SyncConfig,
    reader: Option<SnapshotReader>,
    complete: bool,
}

impl std::fmt::Debug for SourceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSession")
            .field("config", &self.config)
            .field("complete", &self.complete)
            .finish_non_exhaustive()
    }
}

impl SourceSession {
    /// Create a session over the given source log
    pub fn new(source: Arc<dyn SourceLog>, config: SyncConfig) -> Result<Self> {
        config.validate().map_err(Error::session)?;
        Ok(Self {
            source,
            config,
            reader: None,
            complete: false,
        })
    }

    /// Begin a snapshot sync, fixing the boundary at `boundary` or at
    /// the log's current tail. Returns the new sync-request id. Any
    /// in-flight sync is abandoned.
    pub fn start_snapshot_sync(&mut self, boundary: Option<i64>) -> Uuid {
        let boundary = boundary.unwrap_or_else(|| self.source.log_tail());
        let reader = SnapshotReader::new(self.source.clone(), &self.config, boundary);
        let id = reader.sync_request_id();
        tracing::info!("snapshot sync {} started at boundary {}", id, boundary);
        self.reader = Some(reader);
        self.complete = false;
        id
    }

    /// Produce the next outgoing message of the active sync.
    ///
    /// A fatal source error (trim) tears the session down before
    /// propagating; the controller must request a fresh sync.
    pub fn pump_next(&mut self) -> Result<SnapshotBatch> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| Error::session("no active snapshot sync"))?;

        match reader.next() {
            Ok(batch) => {
                if batch.end_of_sync {
                    tracing::info!("snapshot sync {} complete", reader.sync_request_id());
                    self.reader = None;
                    self.complete = true;
                }
                Ok(batch)
            }
            Err(e) => {
                if e.is_fatal_to_session() {
                    tracing::error!(
                        "snapshot sync {} aborted: {}",
                        reader.sync_request_id(),
                        e
                    );
                    self.reader = None;
                }
                Err(e)
            }
        }
    }

    /// Whether the last sync ran to completion
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether a sync is currently in flight
    pub fn is_active(&self) -> bool {
        self.reader.is_some()
    }

    /// Abandon the in-flight sync, if any
    pub fn cancel(&mut self) {
        if let Some(reader) = self.reader.take() {
            tracing::info!("snapshot sync {} cancelled", reader.sync_request_id());
        }
        self.complete = false;
    }

    /// React to a controller event. Only stop-shaped events have an
    /// effect here.
    pub fn handle_event(&mut self, event: &SyncEvent) {
        tracing::debug!("source session event {:?} ({})", event.event_type, event.event_id);
        match event.event_type {
            SyncEventType::SnapshotSyncCancel
            | SyncEventType::TrimmedException
            | SyncEventType::ReplicationStop => self.cancel(),
            _ => {}
        }
    }
}

/// Receiving-site session driving a [`SinkBuffer`]
pub struct SinkSession {
    config: SyncConfig,
    apply: ApplyCallback,
    send_ack: AckCallback,
    buffer: Option<SinkBuffer>,
}

impl SinkSession {
    /// Create a session delivering through `apply` and acknowledging
    /// through `send_ack`
    pub fn new(config: SyncConfig, apply: ApplyCallback, send_ack: AckCallback) -> Result<Self> {
        config.validate().map_err(Error::session)?;
        Ok(Self {
            config,
            apply,
            send_ack,
            buffer: None,
        })
    }

    /// Begin receiving a snapshot sync identified by `request_id` with
    /// the given boundary. Anything buffered by a previous session is
    /// discarded.
    pub fn start_snapshot_sync(&mut self, boundary: i64, request_id: Uuid) {
        tracing::info!("receiving snapshot sync {} up to {}", request_id, boundary);
        self.buffer = Some(SinkBuffer::new(
            MessageKind::Snapshot,
            request_id,
            boundary,
            0,
            &self.config,
            self.apply.clone(),
            self.send_ack.clone(),
        ));
    }

    /// Begin receiving a log-entry sync chained from log position
    /// `from`. Anything buffered by a previous session is discarded.
    pub fn start_log_entry_sync(&mut self, from: i64, request_id: Uuid) {
        tracing::info!("receiving log-entry sync {} from {}", request_id, from);
        self.buffer = Some(SinkBuffer::new(
            MessageKind::LogEntry,
            request_id,
            NON_POSITION,
            from,
            &self.config,
            self.apply.clone(),
            self.send_ack.clone(),
        ));
    }

    /// Feed one raw message from the transport. Messages arriving with
    /// no active session are dropped with a warning.
    pub fn feed(&mut self, raw: &[u8]) -> Result<()> {
        match self.buffer.as_mut() {
            Some(buffer) => buffer.receive(raw),
            None => {
                tracing::warn!("dropping message received outside an active sync session");
                Ok(())
            }
        }
    }

    /// Whether a sync is currently in flight
    pub fn is_active(&self) -> bool {
        self.buffer.is_some()
    }

    /// Abandon the in-flight sync, discarding buffered messages
    pub fn cancel(&mut self) {
        if self.buffer.take().is_some() {
            tracing::info!("sink session cancelled, buffered messages discarded");
        }
    }

    /// React to a controller event. Only stop-shaped events have an
    /// effect here.
    pub fn handle_event(&mut self, event: &SyncEvent) {
        tracing::debug!("sink session event {:?} ({})", event.event_type, event.event_id);
        match event.event_type {
            SyncEventType::SnapshotSyncCancel
            | SyncEventType::TrimmedException
            | SyncEventType::ReplicationStop => self.cancel(),
            _ => {}
        }
    }
}
