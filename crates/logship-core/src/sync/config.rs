//! Sync configuration

use crate::sync::{DEFAULT_ACK_ENTRY_THRESHOLD, DEFAULT_ACK_TIME_MS, DEFAULT_SNAPSHOT_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by the sending and receiving sides of a sync
/// session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Names of the source streams to replicate
    pub streams: Vec<String>,

    /// Number of received messages that triggers an acknowledgment
    pub ack_entry_threshold: u32,

    /// Wall-clock bound on acknowledgment latency; an ack is emitted
    /// on the next receive once this much time has elapsed, even under
    /// a trickle of messages
    pub ack_time_threshold: Duration,

    /// Maximum records per snapshot message
    pub snapshot_batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            streams: Vec::new(),
            ack_entry_threshold: DEFAULT_ACK_ENTRY_THRESHOLD,
            ack_time_threshold: Duration::from_millis(DEFAULT_ACK_TIME_MS),
            snapshot_batch_size: DEFAULT_SNAPSHOT_BATCH_SIZE,
        }
    }
}

impl SyncConfig {
    /// Create a configuration replicating the given streams
    pub fn new<I, S>(streams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            streams: streams.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set the ack entry threshold
    pub fn with_ack_entry_threshold(mut self, threshold: u32) -> Self {
        self.ack_entry_threshold = threshold;
        self
    }

    /// Set the ack time threshold
    pub fn with_ack_time_threshold(mut self, threshold: Duration) -> Self {
        self.ack_time_threshold = threshold;
        self
    }

    /// Set the snapshot batch size
    pub fn with_snapshot_batch_size(mut self, batch_size: usize) -> Self {
        self.snapshot_batch_size = batch_size;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.streams.is_empty() {
            return Err("at least one stream to replicate is required".into());
        }
        if self.ack_entry_threshold == 0 {
            return Err("ack_entry_threshold must be at least 1".into());
        }
        if self.snapshot_batch_size == 0 {
            return Err("snapshot_batch_size must be at least 1".into());
        }
        Ok(())
    }
}
