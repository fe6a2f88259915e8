//! Abstract storage traits for kgraph.
//!
//! A [`GraphStore`] publishes immutable [`Graph`] snapshots and accepts whole
//! committed batches. Readers never see a half-applied batch because the
//! store applies a batch to a graph no reader holds and swaps it in as one
//! unit.

use std::sync::Arc;

use thiserror::Error;

use crate::entity::EntityId;
use crate::graph::{Graph, GraphSummary, Mutation};
use crate::relationship::MergePolicy;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entity not found.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Dense id space exhausted.
    #[error("Capacity exceeded for {0}")]
    CapacityExceeded(&'static str),

    /// A batch was staged against a graph version that is no longer current.
    #[error("Version conflict: batch staged on version {base}, store is at version {current}")]
    VersionConflict {
        /// Version the batch was staged on.
        base: u64,
        /// Version the store is at.
        current: u64,
    },

    /// A lock was poisoned by a panicking thread.
    #[error("Poisoned lock: {0}")]
    PoisonedLock(&'static str),

    /// The store was created under a different merge policy.
    #[error("Merge policy mismatch: store uses {stored}, configured {configured}")]
    PolicyMismatch {
        /// Policy the store was created with.
        stored: MergePolicy,
        /// Policy the caller asked for.
        configured: MergePolicy,
    },

    /// I/O failure in a durable backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Durable data failed an integrity check.
    #[error("Corrupted storage: {0}")]
    Corruption(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A fully staged batch ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitBatch {
    /// Zero-based index of the batch within its ingestion run.
    pub index: u64,
    /// Version of the graph the batch was staged on.
    pub base_version: u64,
    /// Mutations applied while staging, in order.
    pub mutations: Vec<Mutation>,
}

/// Storage trait for the graph.
///
/// # Consistency
/// - `snapshot` returns the latest fully committed graph
/// - `commit` publishes a batch atomically or not at all
/// - only one writer may stage against a given version
pub trait GraphStore: Send + Sync {
    /// Merge policy of the stored graph.
    fn policy(&self) -> MergePolicy;

    /// Returns the latest committed graph.
    fn snapshot(&self) -> Result<Arc<Graph>, StorageError>;

    /// Publishes a staged batch.
    ///
    /// # Errors
    /// - `VersionConflict` if the batch was not staged on the current version
    /// - backend-specific errors; on error nothing from the batch is visible
    fn commit(&self, batch: CommitBatch) -> Result<(), StorageError>;

    /// Entity and relationship counts of the latest committed graph.
    fn summary(&self) -> Result<GraphSummary, StorageError> {
        Ok(self.snapshot()?.summary())
    }
}

pub(crate) fn check_base_version(batch: &CommitBatch, current: &Graph) -> Result<(), StorageError> {
    if batch.base_version != current.version() {
        return Err(StorageError::VersionConflict {
            base: batch.base_version,
            current: current.version(),
        });
    }
    Ok(())
}
