//! Snapshot publication shared by the graph stores.
//!
//! Two graphs are kept: the published one, which readers share, and the one
//! published before it, which only the writer touches. A commit brings the
//! older graph level by replaying the previous batch, applies the new batch
//! and swaps it in. Each commit therefore costs time proportional to the two
//! batches involved, not to the size of the graph. The older graph is copied
//! only while some reader still holds it.

use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use crate::graph::{Graph, Mutation};
use crate::storage::{check_base_version, CommitBatch, StorageError};

/// A previously published graph and the mutations it is missing.
#[derive(Debug)]
struct Lagging {
    graph: Arc<Graph>,
    behind: Vec<Mutation>,
}

#[derive(Debug)]
pub(crate) struct SnapshotCell {
    current: RwLock<Arc<Graph>>,
    spare: Mutex<Option<Lagging>>,
}

impl SnapshotCell {
    pub(crate) fn new(graph: Graph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
            spare: Mutex::new(None),
        }
    }

    pub(crate) fn load(&self) -> Result<Arc<Graph>, StorageError> {
        let current = self
            .current
            .read()
            .map_err(|_| StorageError::PoisonedLock("graph.snapshot"))?;
        Ok(Arc::clone(&current))
    }

    /// Publishes `batch`.
    ///
    /// `persist` runs once the next graph is built and before it is swapped
    /// in; if it fails, nothing is published.
    pub(crate) fn commit<F>(&self, batch: CommitBatch, persist: F) -> Result<(), StorageError>
    where
        F: FnOnce(u64, &[Mutation]) -> Result<(), StorageError>,
    {
        let mut spare = self
            .spare
            .lock()
            .map_err(|_| StorageError::PoisonedLock("graph.commit"))?;
        let current = self.load()?;
        check_base_version(&batch, &current)?;

        let mut next = match spare.take() {
            Some(lagging) => catch_up(lagging, &current)?,
            None => Arc::new((*current).clone()),
        };
        let graph = Arc::make_mut(&mut next);
        for mutation in &batch.mutations {
            graph.apply(mutation)?;
        }
        graph.set_version(current.version() + 1);

        persist(batch.index, &batch.mutations)?;

        *self
            .current
            .write()
            .map_err(|_| StorageError::PoisonedLock("graph.commit"))? = next;
        *spare = Some(Lagging {
            graph: current,
            behind: batch.mutations,
        });
        Ok(())
    }
}

fn catch_up(lagging: Lagging, current: &Graph) -> Result<Arc<Graph>, StorageError> {
    let Lagging { mut graph, behind } = lagging;
    if Arc::get_mut(&mut graph).is_none() {
        debug!(
            version = graph.version(),
            "previous snapshot still held by a reader; copying it"
        );
    }
    let level = Arc::make_mut(&mut graph);
    for mutation in &behind {
        level.apply(mutation)?;
    }
    level.set_version(current.version());
    Ok(graph)
}
