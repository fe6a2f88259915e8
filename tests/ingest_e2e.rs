//! End-to-end ingestion tests.
//!
//! These tests verify that:
//! - re-ingesting the same records is a no-op on the graph
//! - `(name, type)` identity is deduplicated across batches
//! - relationship merges follow the configured policy
//! - rejected records still create their named endpoints

use std::sync::Arc;

use kgraph::query::EdgeDirection;
use kgraph::{
    load_triplets_json, GraphStore, IngestConfig, Ingestor, InMemoryGraphStore, MergePolicy,
    QueryEngine, QueryLimits, RawRecord, TraversalBuilder, ValidationError,
};

fn setup(policy: MergePolicy, batch_size: usize) -> (Arc<InMemoryGraphStore>, Ingestor) {
    let store = Arc::new(InMemoryGraphStore::new(policy));
    let config = IngestConfig::default()
        .with_batch_size(batch_size)
        .with_merge_policy(policy);
    let ingestor = Ingestor::new(store.clone(), config).unwrap();
    (store, ingestor)
}

fn aircraft_records() -> Vec<RawRecord> {
    vec![
        RawRecord::triple("wing", "Component", "part_of", "aircraft", "System")
            .with_evidence("The wing is part of the aircraft.")
            .with_id("1"),
        RawRecord::triple("flap", "Component", "attached_to", "wing", "Component").with_id("2"),
        RawRecord::triple("aileron", "Component", "attached_to", "wing", "Component").with_id("3"),
        RawRecord::triple("aircraft", "System", "located_in", "hangar", "Place").with_id("4"),
        RawRecord::triple("hangar", "Place", "contains", "aircraft", "System").with_id("5"),
    ]
}

#[test]
fn test_reingesting_is_idempotent() {
    let (store, ingestor) = setup(MergePolicy::Collapse, 2);

    ingestor.ingest(aircraft_records()).unwrap();
    let once = store.snapshot().unwrap();

    ingestor.ingest(aircraft_records()).unwrap();
    let twice = store.snapshot().unwrap();

    assert_eq!(once.entity_count(), 5);
    assert_eq!(once.relationship_count(), 5);
    assert_eq!(twice.entity_count(), once.entity_count());
    assert_eq!(twice.relationship_count(), once.relationship_count());
    assert_eq!(twice.fingerprint(), once.fingerprint());
    // Ids do not move either.
    assert_eq!(twice.find("hangar", "Place"), once.find("hangar", "Place"));
}

#[test]
fn test_identity_is_deduplicated_across_batches() {
    let (store, ingestor) = setup(MergePolicy::Collapse, 1);
    let records = vec![
        RawRecord::triple("wing", "Component", "part_of", "aircraft", "System"),
        RawRecord::triple(" wing ", "Component", "part_of", "glider", "System"),
        RawRecord::triple("wing", "Concept", "related_to", "lift", "Concept"),
    ];
    let report = ingestor.ingest(records).unwrap();
    assert_eq!(report.batches_committed, 3);

    let graph = store.snapshot().unwrap();
    // wing/Component, aircraft, glider, wing/Concept, lift
    assert_eq!(graph.entity_count(), 5);
    assert_eq!(graph.find_by_name("wing").len(), 2);
    let wing = graph.find("wing", "Component").unwrap();
    assert_eq!(graph.outgoing(wing).len(), 2);
}

#[test]
fn test_collapse_overwrites_relation_label() {
    let (store, ingestor) = setup(MergePolicy::Collapse, 10);
    let records = vec![
        RawRecord::triple("X", "", "R1", "Y", "").with_evidence("first").with_id("a"),
        RawRecord::triple("X", "", "R2", "Y", "").with_evidence("second"),
    ];
    ingestor.ingest(records).unwrap();

    let graph = store.snapshot().unwrap();
    assert_eq!(graph.relationship_count(), 1);
    let rel = graph.relationships().next().unwrap();
    assert_eq!(rel.relation, "R2");
    assert_eq!(rel.evidence.as_deref(), Some("second"));
    assert_eq!(rel.record_id, None);
}

#[test]
fn test_collapse_overwrite_spans_batches_in_order() {
    let (store, ingestor) = setup(MergePolicy::Collapse, 1);
    ingestor
        .ingest(vec![RawRecord::triple("X", "", "R1", "Y", "")])
        .unwrap();
    ingestor
        .ingest(vec![RawRecord::triple("X", "", "R2", "Y", "")])
        .unwrap();

    let graph = store.snapshot().unwrap();
    assert_eq!(graph.relationship_count(), 1);
    assert_eq!(graph.relationships().next().unwrap().relation, "R2");
}

#[test]
fn test_multi_edge_keeps_both_labels() {
    let (store, ingestor) = setup(MergePolicy::MultiEdge, 10);
    let records = vec![
        RawRecord::triple("X", "", "R1", "Y", ""),
        RawRecord::triple("X", "", "R2", "Y", ""),
        RawRecord::triple("X", "", "R1", "Y", "").with_evidence("again"),
    ];
    ingestor.ingest(records).unwrap();

    let graph = store.snapshot().unwrap();
    assert_eq!(graph.relationship_count(), 2);
    let labels: Vec<_> = graph.relationships().map(|r| r.relation.as_str()).collect();
    assert_eq!(labels, vec!["R1", "R2"]);
    assert_eq!(
        graph.relationships().next().unwrap().evidence.as_deref(),
        Some("again")
    );
}

#[test]
fn test_empty_relation_creates_endpoints_only() {
    let (store, ingestor) = setup(MergePolicy::Collapse, 10);
    let report = ingestor
        .ingest(vec![RawRecord::triple("wing", "Component", "   ", "aircraft", "System")])
        .unwrap();

    assert_eq!(report.relationships_merged, 0);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(
        report.rejected[0].reason,
        ValidationError::MissingField {
            field: "relation".to_string()
        }
    );

    let graph = store.snapshot().unwrap();
    assert_eq!(graph.relationship_count(), 0);
    assert_eq!(graph.entity_count(), 2);
}

#[test]
fn test_missing_tail_creates_head_only() {
    let (store, ingestor) = setup(MergePolicy::Collapse, 10);
    ingestor
        .ingest(vec![RawRecord::triple("wing", "Component", "part_of", "", "System")])
        .unwrap();

    let graph = store.snapshot().unwrap();
    assert_eq!(graph.entity_count(), 1);
    assert!(graph.find("wing", "Component").is_some());
    assert!(graph.find("", "System").is_none());
}

#[test]
fn test_wing_example_end_to_end() {
    let (store, ingestor) = setup(MergePolicy::Collapse, 1000);
    ingestor.ingest(aircraft_records()).unwrap();

    let engine = QueryEngine::new(store, QueryLimits::default()).unwrap();
    let request = TraversalBuilder::new("wing")
        .entity_type("Component")
        .relation("part_of")
        .build()
        .unwrap();
    let result = engine.neighborhood(&request).unwrap();

    assert_eq!(
        result.triples(),
        vec![("wing", "part_of", "aircraft", EdgeDirection::Outgoing)]
    );
    assert_eq!(result.edges[0].record_id.as_deref(), Some("1"));
    assert_eq!(
        result.edges[0].evidence.as_deref(),
        Some("The wing is part of the aircraft.")
    );
}

#[test]
fn test_triplet_file_ingestion() {
    let json = r#"[
        {"subject": "wing", "subject_type": "Component", "relation_type": "part_of",
         "object": "aircraft", "object_type": "System", "evidence": "The wing is part of the aircraft."},
        {"subject": "flap", "relation_type": "attached_to", "object": "wing", "object_type": "Component"}
    ]"#;
    let triplets = load_triplets_json(json.as_bytes()).unwrap();
    assert_eq!(triplets.len(), 2);

    let (store, ingestor) = setup(MergePolicy::Collapse, 10);
    let report = ingestor.ingest_triplets(triplets).unwrap();
    assert_eq!(report.relationships_merged, 2);

    let graph = store.snapshot().unwrap();
    // flap has an empty type, so it is distinct from any typed flap.
    assert!(graph.find("flap", "").is_some());
    for rel in graph.relationships() {
        let id = rel.record_id.as_deref().unwrap();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

#[test]
fn test_malformed_triplet_file_is_a_validation_error() {
    let err = load_triplets_json("{\"not\": \"an array\"}".as_bytes()).unwrap_err();
    assert!(matches!(err, ValidationError::MalformedInput { .. }));
}

#[test]
fn test_long_names_still_create_entities_and_edges() {
    let (store, ingestor) = setup(MergePolicy::Collapse, 10);
    let long = "w".repeat(17 * 1024);
    let report = ingestor
        .ingest(vec![RawRecord::triple(long.clone(), "Component", "part_of", "aircraft", "System")])
        .unwrap();

    assert!(report.rejected.is_empty());
    assert_eq!(report.relationships_merged, 1);
    let graph = store.snapshot().unwrap();
    let head = graph.find(&long, "Component").unwrap();
    assert_eq!(graph.entity_count(), 2);
    assert_eq!(graph.outgoing(head).len(), 1);
}

#[test]
fn test_small_batches_build_the_same_graph_as_one_batch() {
    let records: Vec<_> = (0..2000)
        .map(|i| {
            RawRecord::triple(
                format!("part{}", i % 300),
                "Component",
                format!("r{}", i % 3),
                format!("assembly{}", i % 40),
                "System",
            )
            .with_id(i.to_string())
        })
        .collect();

    let (single, ingestor) = setup(MergePolicy::MultiEdge, records.len());
    ingestor.ingest(records.clone()).unwrap();

    let (batched, ingestor) = setup(MergePolicy::MultiEdge, 7);
    // Hold a snapshot while later batches commit.
    let early = {
        ingestor.ingest(records[..700].to_vec()).unwrap();
        batched.snapshot().unwrap()
    };
    ingestor.ingest(records[700..].to_vec()).unwrap();

    let expected = single.snapshot().unwrap();
    let graph = batched.snapshot().unwrap();
    assert_eq!(graph.fingerprint(), expected.fingerprint());
    assert_eq!(graph.relationship_count(), 600);
    assert_eq!(graph.version(), 100 + 186);

    // The held snapshot kept its own state.
    assert_eq!(early.version(), 100);
    let rel = early.relationships().next().unwrap();
    assert_eq!(rel.record_id.as_deref(), Some("600"));
    assert_eq!(graph.relationships().next().unwrap().record_id.as_deref(), Some("1800"));
}
