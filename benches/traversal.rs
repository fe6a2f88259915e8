use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use kgraph::query::Direction;
use kgraph::{
    IngestConfig, Ingestor, InMemoryGraphStore, MergePolicy, QueryEngine, QueryLimits, RawRecord,
    TraversalBuilder,
};

/// Component tree: `root` has `FANOUT` children, each with `FANOUT` children,
/// plus a back edge from every leaf to the root so traversals meet cycles.
const FANOUT: usize = 32;

fn tree_records() -> Vec<RawRecord> {
    let mut records = Vec::with_capacity(FANOUT * FANOUT * 2 + FANOUT);
    for i in 0..FANOUT {
        let child = format!("assembly{i}");
        records.push(RawRecord::triple(child.clone(), "Assembly", "part_of", "root", "System"));
        for j in 0..FANOUT {
            let leaf = format!("part{i}_{j}");
            records.push(RawRecord::triple(leaf.clone(), "Part", "part_of", child.clone(), "Assembly"));
            records.push(RawRecord::triple("root", "System", "depends_on", leaf, "Part"));
        }
    }
    records
}

fn make_engine() -> QueryEngine {
    let store = Arc::new(InMemoryGraphStore::new(MergePolicy::Collapse));
    Ingestor::new(store.clone(), IngestConfig::default())
        .and_then(|ingestor| ingestor.ingest(tree_records()))
        .unwrap();
    QueryEngine::new(store, QueryLimits::default()).unwrap()
}

fn bench_neighborhood(c: &mut Criterion) {
    let engine = make_engine();
    let mut group = c.benchmark_group("neighborhood");
    group.throughput(Throughput::Elements(1));

    for hops in [1, 2, 3] {
        let request = TraversalBuilder::new("root").max_hops(hops).build().unwrap();
        group.bench_function(format!("root_{hops}_hops"), |b| {
            b.iter(|| black_box(engine.neighborhood(black_box(&request)).unwrap()));
        });
    }

    let filtered = TraversalBuilder::new("root")
        .relation("part_of")
        .direction(Direction::Incoming)
        .max_hops(2)
        .build()
        .unwrap();
    group.bench_function("root_part_of_incoming", |b| {
        b.iter(|| black_box(engine.neighborhood(black_box(&filtered)).unwrap()));
    });
    group.finish();
}

fn bench_paths(c: &mut Criterion) {
    let engine = make_engine();
    let mut group = c.benchmark_group("paths");
    group.throughput(Throughput::Elements(1));

    let request = TraversalBuilder::new("assembly0").max_hops(2).build().unwrap();
    group.bench_function("assembly_2_hops", |b| {
        b.iter(|| black_box(engine.paths(black_box(&request)).unwrap()));
    });
    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let records = tree_records();
    let mut group = c.benchmark_group("ingest");
    group.throughput(Throughput::Elements(records.len() as u64));

    group.bench_function("tree_batch_1000", |b| {
        b.iter_batched(
            || records.clone(),
            |batch| {
                let store = Arc::new(InMemoryGraphStore::new(MergePolicy::Collapse));
                let report = Ingestor::new(store, IngestConfig::default())
                    .and_then(|ingestor| ingestor.ingest(batch))
                    .unwrap();
                black_box(report)
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(traversal, bench_neighborhood, bench_paths, bench_ingest);
criterion_main!(traversal);
