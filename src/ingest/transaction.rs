//! Scoped, all-or-nothing mutation context for one ingestion batch.

use tracing::warn;

use crate::entity::{Entity, EntityId, EntityKey};
use crate::graph::{Mutation, StagedGraph};
use crate::relationship::EdgeId;
use crate::storage::{CommitBatch, GraphStore, StorageError};

/// A batch being staged against the latest committed graph.
///
/// Changes are kept in a [`StagedGraph`] overlay on the committed snapshot
/// and logged as mutations. Nothing done through a transaction is visible to
/// readers until [`commit`](Self::commit) succeeds. Dropping an uncommitted
/// transaction discards every staged effect.
pub struct BatchTransaction<'s> {
    store: &'s dyn GraphStore,
    index: u64,
    base_version: u64,
    staged: StagedGraph,
    mutations: Vec<Mutation>,
    committed: bool,
}

impl<'s> BatchTransaction<'s> {
    /// Opens a transaction on the latest committed graph.
    ///
    /// # Errors
    /// Propagates snapshot failures from the store.
    pub fn begin(store: &'s dyn GraphStore, index: u64) -> Result<Self, StorageError> {
        let snapshot = store.snapshot()?;
        Ok(Self {
            store,
            index,
            base_version: snapshot.version(),
            staged: StagedGraph::new(snapshot),
            mutations: Vec::new(),
            committed: false,
        })
    }

    /// Zero-based index of this batch within its run.
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// The staged graph, including uncommitted changes.
    #[must_use]
    pub fn staged(&self) -> &StagedGraph {
        &self.staged
    }

    /// Number of logged mutations so far.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }

    /// Resolves `key`, returning its id and whether it was created.
    ///
    /// # Errors
    /// [`StorageError::CapacityExceeded`] if the entity id space is exhausted.
    pub fn resolve(&mut self, key: &EntityKey) -> Result<(EntityId, bool), StorageError> {
        let before = self.staged.entity_count();
        let id = self.staged.resolve(&key.name, &key.entity_type)?;
        let created = self.staged.entity_count() > before;
        if created {
            self.mutations.push(Mutation::ResolveEntity { key: key.clone() });
        }
        Ok((id, created))
    }

    /// Merges the edge `head → tail`. See [`crate::graph::Graph::merge`].
    ///
    /// # Errors
    /// - [`StorageError::EntityNotFound`] if either endpoint is unknown
    /// - [`StorageError::CapacityExceeded`] if the edge id space is exhausted
    pub fn merge(
        &mut self,
        head: EntityId,
        tail: EntityId,
        relation: &str,
        evidence: Option<&str>,
        record_id: Option<&str>,
    ) -> Result<EdgeId, StorageError> {
        let id = self.staged.merge(head, tail, relation, evidence, record_id)?;
        let head = self.key_of(head)?;
        let tail = self.key_of(tail)?;
        self.mutations.push(Mutation::MergeRelationship {
            head,
            tail,
            relation: relation.to_string(),
            evidence: evidence.map(str::to_string),
            record_id: record_id.map(str::to_string),
        });
        Ok(id)
    }

    fn key_of(&self, id: EntityId) -> Result<EntityKey, StorageError> {
        self.staged
            .entity(id)
            .map(Entity::key)
            .ok_or(StorageError::EntityNotFound(id))
    }

    /// Publishes the staged batch as one atomic unit.
    ///
    /// # Errors
    /// Propagates the store's commit failure; the transaction is rolled back.
    pub fn commit(mut self) -> Result<(), StorageError> {
        self.store.commit(CommitBatch {
            index: self.index,
            base_version: self.base_version,
            mutations: std::mem::take(&mut self.mutations),
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for BatchTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            warn!(
                batch = self.index,
                base_version = self.base_version,
                "batch rolled back"
            );
        }
    }
}
