//! In-memory storage backend.
//!
//! Publishes graph snapshots by swap: the current graph lives behind an
//! `Arc`, readers clone the `Arc`, and a commit replaces it under a write lock
//! held only for the swap.

use std::sync::Arc;

use crate::graph::Graph;
use crate::relationship::MergePolicy;
use crate::storage::snapshot::SnapshotCell;
use crate::storage::{CommitBatch, GraphStore, StorageError};

/// Thread-safe in-memory graph store.
#[derive(Debug)]
pub struct InMemoryGraphStore {
    policy: MergePolicy,
    snapshots: SnapshotCell,
}

impl InMemoryGraphStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new(policy: MergePolicy) -> Self {
        Self::from_graph(Graph::new(policy))
    }

    /// Create a store that starts from an existing graph.
    #[must_use]
    pub fn from_graph(graph: Graph) -> Self {
        Self {
            policy: graph.policy(),
            snapshots: SnapshotCell::new(graph),
        }
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new(MergePolicy::default())
    }
}

impl GraphStore for InMemoryGraphStore {
    fn policy(&self) -> MergePolicy {
        self.policy
    }

    fn snapshot(&self) -> Result<Arc<Graph>, StorageError> {
        self.snapshots.load()
    }

    fn commit(&self, batch: CommitBatch) -> Result<(), StorageError> {
        self.snapshots.commit(batch, |_, _| Ok(()))
    }
}
