//! Crash recovery tests for persistent storage.
//!
//! These tests verify that the storage layer correctly handles:
//! - Reopening a graph after ingestion (WAL replay)
//! - A batch entry cut short by a crash
//! - CRC corruption detection
//! - Merge policy fixed at creation
//! - A log header cut short while the graph was being created

#![cfg(feature = "persistent")]

use std::fs::{self, OpenOptions};
use std::sync::Arc;

use kgraph::storage::persistent::{open_database, PersistentConfig};
use kgraph::{
    GraphError, GraphStore, IngestConfig, Ingestor, MergePolicy, QueryEngine, QueryLimits,
    RawRecord, StorageError, TraversalBuilder,
};
use tempfile::tempdir;

fn batch_one() -> Vec<RawRecord> {
    vec![
        RawRecord::triple("wing", "Component", "part_of", "aircraft", "System").with_id("1"),
        RawRecord::triple("flap", "Component", "attached_to", "wing", "Component").with_id("2"),
    ]
}

fn batch_two() -> Vec<RawRecord> {
    vec![
        RawRecord::triple("aircraft", "System", "located_in", "hangar", "Place").with_id("3"),
        RawRecord::triple("wing", "Component", "part_of", "aircraft", "System")
            .with_evidence("The wing is part of the aircraft.")
            .with_id("4"),
    ]
}

fn ingest(store: Arc<dyn GraphStore>, records: Vec<RawRecord>) {
    let config = IngestConfig::default()
        .with_batch_size(2)
        .with_merge_policy(store.policy());
    Ingestor::new(store, config)
        .unwrap()
        .ingest(records)
        .unwrap();
}

#[test]
fn test_reopen_restores_the_same_graph() {
    let dir = tempdir().unwrap();

    let fingerprint = {
        let store = Arc::new(open_database(dir.path(), MergePolicy::Collapse, None).unwrap());
        ingest(store.clone(), batch_one());
        ingest(store.clone(), batch_two());
        store.snapshot().unwrap().fingerprint()
    };

    // Twice, to check that replay does not append anything.
    for _ in 0..2 {
        let store = Arc::new(open_database(dir.path(), MergePolicy::Collapse, None).unwrap());
        let graph = store.snapshot().unwrap();
        assert_eq!(graph.fingerprint(), fingerprint);
        assert_eq!(graph.version(), 2);
        assert_eq!(graph.entity_count(), 4);
        assert_eq!(graph.relationship_count(), 3);
    }

    let store = Arc::new(open_database(dir.path(), MergePolicy::Collapse, None).unwrap());
    let engine = QueryEngine::new(store, QueryLimits::default()).unwrap();
    let request = TraversalBuilder::new("wing").relation("part_of").build().unwrap();
    let result = engine.neighborhood(&request).unwrap();
    assert_eq!(result.edges.len(), 1);
    assert_eq!(result.edges[0].record_id.as_deref(), Some("4"));
}

#[test]
fn test_torn_batch_is_discarded_on_reopen() {
    let dir = tempdir().unwrap();
    let config = PersistentConfig {
        sync_on_write: false,
        ..PersistentConfig::default()
    };
    let wal_path = dir.path().join(&config.wal_file_name);

    let (after_first, first_fingerprint) = {
        let store =
            Arc::new(open_database(dir.path(), MergePolicy::Collapse, Some(config.clone())).unwrap());
        ingest(store.clone(), batch_one());
        let size = store.wal_size_bytes().unwrap();
        let fingerprint = store.snapshot().unwrap().fingerprint();
        ingest(store.clone(), batch_two());
        (size, fingerprint)
    };

    // Simulate a crash midway through writing the second batch.
    let full = fs::metadata(&wal_path).unwrap().len();
    assert!(full > after_first + 8);
    let file = OpenOptions::new().write(true).open(&wal_path).unwrap();
    file.set_len(after_first + (full - after_first) / 2).unwrap();
    drop(file);

    let store =
        Arc::new(open_database(dir.path(), MergePolicy::Collapse, Some(config.clone())).unwrap());
    let graph = store.snapshot().unwrap();
    assert_eq!(graph.version(), 1);
    assert_eq!(graph.fingerprint(), first_fingerprint);
    assert!(graph.find("hangar", "Place").is_none());
    assert_eq!(store.wal_size_bytes().unwrap(), after_first);

    // Re-ingesting the lost batch completes the graph.
    ingest(store.clone(), batch_two());
    drop(store);
    let store = open_database(dir.path(), MergePolicy::Collapse, Some(config)).unwrap();
    assert_eq!(store.snapshot().unwrap().relationship_count(), 3);
}

#[test]
fn test_checksum_mismatch_is_reported() {
    let dir = tempdir().unwrap();
    let wal_path = dir.path().join(PersistentConfig::default().wal_file_name);

    {
        let store = Arc::new(open_database(dir.path(), MergePolicy::Collapse, None).unwrap());
        ingest(store, batch_one());
    }

    // Flip a byte inside the last entry's payload.
    let mut bytes = fs::read(&wal_path).unwrap();
    let at = bytes.len() - 10;
    bytes[at] ^= 0x20;
    fs::write(&wal_path, bytes).unwrap();

    let err = open_database(dir.path(), MergePolicy::Collapse, None).unwrap_err();
    assert!(err.is_storage());
    assert!(matches!(err, GraphError::Storage(StorageError::Corruption(_))));
}

#[test]
fn test_reopen_with_other_policy_is_rejected() {
    let dir = tempdir().unwrap();
    {
        let store = Arc::new(open_database(dir.path(), MergePolicy::MultiEdge, None).unwrap());
        ingest(store, batch_one());
    }

    let err = open_database(dir.path(), MergePolicy::Collapse, None).unwrap_err();
    assert!(matches!(
        err,
        GraphError::Storage(StorageError::PolicyMismatch {
            stored: MergePolicy::MultiEdge,
            configured: MergePolicy::Collapse,
        })
    ));
}

#[test]
fn test_partial_header_from_a_crash_on_create_is_recovered() {
    let dir = tempdir().unwrap();
    let wal_path = dir.path().join(PersistentConfig::default().wal_file_name);
    fs::write(&wal_path, b"KG").unwrap();

    let store = Arc::new(open_database(dir.path(), MergePolicy::Collapse, None).unwrap());
    assert_eq!(store.snapshot().unwrap().version(), 0);
    ingest(store.clone(), batch_one());
    drop(store);

    let store = open_database(dir.path(), MergePolicy::Collapse, None).unwrap();
    let graph = store.snapshot().unwrap();
    assert_eq!(graph.version(), 1);
    assert_eq!(graph.relationship_count(), 2);
}
