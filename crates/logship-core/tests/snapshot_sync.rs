//! End-to-end snapshot sync between a source and a sink session,
//! exercising the wire codec, arbitrary arrival order, duplicates,
//! acknowledgment flow, and trim handling.

use logship_core::source::{MemoryLog, OpaqueRecord, SourceLog};
use logship_core::sync::{SinkSession, SourceSession, SyncConfig};
use logship_core::Error;
use logship_protocol::SyncEntry;
use parking_lot::Mutex;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn seeded_log() -> Arc<MemoryLog> {
    let log = MemoryLog::new();
    for i in 0u8..10 {
        log.append("orders", vec![i]);
    }
    for i in 10u8..16 {
        log.append("accounts", vec![i]);
    }
    Arc::new(log)
}

/// Run a full snapshot sync on the sending side, returning the session
/// id, its boundary, and every framed message in emission order
fn emit_all(log: &Arc<MemoryLog>, config: &SyncConfig) -> (Uuid, i64, Vec<Vec<u8>>) {
    let mut source = SourceSession::new(log.clone(), config.clone()).unwrap();
    let boundary = log.log_tail();
    let id = source.start_snapshot_sync(Some(boundary));

    let mut frames = Vec::new();
    loop {
        let batch = source.pump_next().unwrap();
        if let Some(entry) = batch.entry {
            frames.push(entry.encode().unwrap());
        }
        if batch.end_of_sync {
            break;
        }
    }
    (id, boundary, frames)
}

/// Build a sink session recording applied entries and ack positions
fn receiving_side(
    config: SyncConfig,
) -> (SinkSession, Arc<Mutex<Vec<SyncEntry>>>, Arc<Mutex<Vec<i64>>>) {
    let applied = Arc::new(Mutex::new(Vec::new()));
    let acks = Arc::new(Mutex::new(Vec::new()));
    let applied_cb = applied.clone();
    let acks_cb = acks.clone();
    let session = SinkSession::new(
        config,
        Arc::new(move |entry| {
            applied_cb.lock().push(entry);
            Ok(())
        }),
        Arc::new(move |ack: SyncEntry| {
            acks_cb.lock().push(ack.metadata.timestamp);
            Ok(())
        }),
    )
    .unwrap();
    (session, applied, acks)
}

fn applied_records(applied: &Mutex<Vec<SyncEntry>>) -> Vec<OpaqueRecord> {
    applied
        .lock()
        .iter()
        .flat_map(|e| bincode::deserialize::<Vec<OpaqueRecord>>(&e.payload).unwrap())
        .collect()
}

#[test]
fn shuffled_delivery_reproduces_source_order() {
    let log = seeded_log();
    let config = SyncConfig::new(["orders", "accounts"]).with_snapshot_batch_size(3);
    let (id, boundary, frames) = emit_all(&log, &config);
    assert!(frames.len() > 2);

    let mut shuffled = frames.clone();
    shuffled.shuffle(&mut StdRng::seed_from_u64(7));

    let (mut sink, applied, _) = receiving_side(config);
    sink.start_snapshot_sync(boundary, id);
    for frame in &shuffled {
        sink.feed(frame).unwrap();
    }

    // Applied order matches emission order exactly
    let sequences: Vec<u64> = applied.lock().iter().map(|e| e.metadata.sequence).collect();
    assert_eq!(sequences, (0..frames.len() as u64).collect::<Vec<_>>());

    // And the record stream is "accounts" then "orders", each in
    // version order
    let records = applied_records(&applied);
    assert_eq!(records.len(), 16);
    let versions: Vec<i64> = records.iter().map(|r| r.version).collect();
    let accounts: Vec<i64> = (10..16).collect();
    let orders: Vec<i64> = (0..10).collect();
    assert_eq!(versions, [accounts, orders].concat());
}

#[test]
fn duplicates_are_applied_once() {
    let log = seeded_log();
    let config = SyncConfig::new(["orders", "accounts"]).with_snapshot_batch_size(4);
    let (id, boundary, frames) = emit_all(&log, &config);

    // Deliver everything twice, interleaved out of order
    let mut doubled: Vec<&Vec<u8>> = frames.iter().chain(frames.iter()).collect();
    doubled.shuffle(&mut StdRng::seed_from_u64(42));

    let (mut sink, applied, _) = receiving_side(config);
    sink.start_snapshot_sync(boundary, id);
    for frame in doubled {
        sink.feed(frame).unwrap();
    }

    assert_eq!(applied.lock().len(), frames.len());
    assert_eq!(applied_records(&applied).len(), 16);
}

#[test]
fn acks_track_contiguous_progress() {
    let log = seeded_log();
    let config = SyncConfig::new(["orders", "accounts"])
        .with_snapshot_batch_size(2)
        .with_ack_entry_threshold(1)
        .with_ack_time_threshold(Duration::from_secs(3600));
    let (id, boundary, frames) = emit_all(&log, &config);

    let mut shuffled = frames.clone();
    shuffled.shuffle(&mut StdRng::seed_from_u64(3));

    let (mut sink, _, acks) = receiving_side(config);
    sink.start_snapshot_sync(boundary, id);
    for frame in &shuffled {
        sink.feed(frame).unwrap();
    }

    let positions = acks.lock().clone();
    assert_eq!(positions.len(), frames.len());
    assert!(positions.windows(2).all(|w| w[0] <= w[1]));
    // Everything delivered: final ack names the last sequence number
    assert_eq!(*positions.last().unwrap(), frames.len() as i64 - 1);
}

#[test]
fn trim_mid_sync_is_fatal_and_resyncable() {
    let log = seeded_log();
    let config = SyncConfig::new(["orders", "accounts"]).with_snapshot_batch_size(4);
    let mut source = SourceSession::new(log.clone(), config.clone()).unwrap();
    source.start_snapshot_sync(None);

    // First stream batch comes out fine
    assert!(source.pump_next().unwrap().entry.is_some());

    // Compaction removes data the session still needs
    log.trim(5);
    let err = loop {
        match source.pump_next() {
            Ok(_) => continue,
            Err(e) => break e,
        }
    };
    assert!(matches!(err, Error::Trimmed { .. }));
    assert!(err.is_fatal_to_session());
    assert!(!source.is_active());

    // A fresh session over the surviving stream succeeds
    let config = SyncConfig::new(["accounts"]);
    let mut source = SourceSession::new(log.clone(), config).unwrap();
    source.start_snapshot_sync(None);
    let batch = source.pump_next().unwrap();
    assert!(batch.entry.is_some());
}

#[test]
fn empty_source_completes_immediately() {
    let log = Arc::new(MemoryLog::new());
    let config = SyncConfig::new(["orders"]);
    let mut source = SourceSession::new(log, config).unwrap();
    source.start_snapshot_sync(None);

    let batch = source.pump_next().unwrap();
    assert!(batch.entry.is_none());
    assert!(batch.end_of_sync);
    assert!(source.is_complete());
}

#[test]
fn boundary_excludes_later_appends() {
    let log = seeded_log();
    let config = SyncConfig::new(["orders", "accounts"]).with_snapshot_batch_size(100);
    let boundary = log.log_tail();

    let mut source = SourceSession::new(log.clone(), config.clone()).unwrap();
    let id = source.start_snapshot_sync(Some(boundary));

    // Appends after the boundary is fixed must not leak into the sync
    log.append("orders", vec![99]);

    let (mut sink, applied, _) = receiving_side(config);
    sink.start_snapshot_sync(boundary, id);
    loop {
        let batch = source.pump_next().unwrap();
        if let Some(entry) = batch.entry {
            sink.feed(&entry.encode().unwrap()).unwrap();
        }
        if batch.end_of_sync {
            break;
        }
    }

    let records = applied_records(&applied);
    assert_eq!(records.len(), 16);
    assert!(records.iter().all(|r| r.version <= boundary));
}

proptest! {
    /// Any arrival permutation yields the exact emission order
    #[test]
    fn any_permutation_preserves_order(
        order in Just((0usize..8).collect::<Vec<_>>()).prop_shuffle()
    ) {
        let log = seeded_log();
        let config = SyncConfig::new(["orders", "accounts"]).with_snapshot_batch_size(2);
        let (id, boundary, frames) = emit_all(&log, &config);
        prop_assert_eq!(frames.len(), 8);

        let (mut sink, applied, _) = receiving_side(config);
        sink.start_snapshot_sync(boundary, id);
        for &i in &order {
            sink.feed(&frames[i]).unwrap();
        }

        let sequences: Vec<u64> =
            applied.lock().iter().map(|e| e.metadata.sequence).collect();
        prop_assert_eq!(sequences, (0..8u64).collect::<Vec<_>>());
    }
}
