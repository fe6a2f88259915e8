//! # kgraph - Triple ingestion into a property graph
//!
//! kgraph turns a stream of subject–predicate–object records into a
//! deduplicated, type-tagged property graph and answers bounded-hop
//! traversal queries over it.
//!
//! ## Core Concepts
//!
//! - **Entity**: a node identified by its exact `(name, type)` pair
//! - **Relationship**: a directed edge carrying a relation label, evidence and
//!   a source record id; one edge per ordered entity pair by default
//! - **Batch**: a fixed-size group of records committed atomically
//! - **Snapshot**: an immutable view of the graph that queries read from
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use kgraph::query::{EdgeDirection, TraversalBuilder};
//! use kgraph::{
//!     IngestConfig, Ingestor, InMemoryGraphStore, MergePolicy, QueryEngine, QueryLimits,
//!     RawRecord,
//! };
//!
//! let store = Arc::new(InMemoryGraphStore::new(MergePolicy::Collapse));
//! let ingestor = Ingestor::new(store.clone(), IngestConfig::default()).unwrap();
//! ingestor
//!     .ingest(vec![RawRecord::triple("wing", "Component", "part_of", "aircraft", "System")])
//!     .unwrap();
//!
//! let engine = QueryEngine::new(store, QueryLimits::default()).unwrap();
//! let request = TraversalBuilder::new("wing").build().unwrap();
//! let result = engine.neighborhood(&request).unwrap();
//! assert_eq!(
//!     result.triples(),
//!     vec![("wing", "part_of", "aircraft", EdgeDirection::Outgoing)]
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod entity;
pub mod error;
pub mod record;
pub mod relationship;

// Graph, storage and configuration
pub mod config;
pub mod graph;
pub mod storage;

// Ingestion and queries
pub mod evidence;
pub mod ingest;
pub mod query;
pub mod runtime;

// Re-export primary types at crate root for convenience
pub use config::{IngestConfig, QueryLimits, RuntimeConfig};
pub use entity::{Entity, EntityId, EntityKey};
pub use error::{
    ExecutionError, GraphError, GraphResult, IngestError, QueryError, ValidationError,
};
pub use evidence::{EvidenceVerifier, Verification, VerificationReport};
pub use graph::{Graph, GraphSummary, Mutation, StagedGraph};
pub use ingest::{BatchTransaction, IngestReport, Ingestor, RejectedRecord};
pub use query::{QueryEngine, TraversalBuilder, TraversalRequest};
pub use record::{load_triplets_json, normalize, ExtractedTriplet, RawRecord};
pub use relationship::{EdgeId, MergePolicy, Relationship};
pub use runtime::{ExecutionHandle, ExecutionPath, GraphRuntime};
pub use storage::{CommitBatch, GraphStore, InMemoryGraphStore, StorageError};
