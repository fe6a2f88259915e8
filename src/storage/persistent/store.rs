//! Durable graph store: write-ahead log plus an in-memory snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::graph::Graph;
use crate::relationship::MergePolicy;
use crate::storage::snapshot::SnapshotCell;
use crate::storage::{CommitBatch, GraphStore, StorageError};

use super::file_lock::FileLock;
use super::wal::{WalEntryKind, WriteAheadLog};
use super::PersistentConfig;

/// A [`GraphStore`] whose committed batches survive restarts.
///
/// Every commit is appended to the write-ahead log before the new snapshot
/// is published; opening the directory replays the log to rebuild the graph.
#[derive(Debug)]
pub struct PersistentGraphStore {
    dir: PathBuf,
    policy: MergePolicy,
    wal: WriteAheadLog,
    snapshots: SnapshotCell,
    _lock: FileLock,
}

impl PersistentGraphStore {
    /// Opens or creates the graph stored in `dir`.
    ///
    /// # Errors
    /// - [`StorageError::Io`] if the directory cannot be created or is locked
    ///   by another process
    /// - [`StorageError::PolicyMismatch`] if the graph was created under a
    ///   different merge policy
    /// - [`StorageError::Corruption`] if the log fails validation
    pub fn open(
        dir: &Path,
        policy: MergePolicy,
        config: &PersistentConfig,
    ) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir)?;
        let lock = FileLock::acquire(dir)?;
        let wal = WriteAheadLog::open(&dir.join(&config.wal_file_name), config.sync_on_write)?;

        let graph = replay(&wal, policy)?;
        info!(
            dir = %dir.display(),
            batches = graph.version(),
            entities = graph.entity_count(),
            relationships = graph.relationship_count(),
            "opened persistent graph"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            policy,
            wal,
            snapshots: SnapshotCell::new(graph),
            _lock: lock,
        })
    }

    /// Directory holding the log and the lock file.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Size of the write-ahead log in bytes.
    ///
    /// # Errors
    /// [`StorageError::Io`] if the log file cannot be inspected.
    pub fn wal_size_bytes(&self) -> Result<u64, StorageError> {
        self.wal.size_bytes()
    }
}

fn replay(wal: &WriteAheadLog, policy: MergePolicy) -> Result<Graph, StorageError> {
    let entries = wal.entries()?;
    let mut graph = Graph::new(policy);

    let Some((first, rest)) = entries.split_first() else {
        wal.append(WalEntryKind::Init {
            merge_policy: policy,
        })?;
        return Ok(graph);
    };

    match first.kind {
        WalEntryKind::Init { merge_policy } if merge_policy == policy => {}
        WalEntryKind::Init { merge_policy } => {
            return Err(StorageError::PolicyMismatch {
                stored: merge_policy,
                configured: policy,
            });
        }
        WalEntryKind::BatchCommit { .. } => {
            return Err(StorageError::Corruption(
                "write-ahead log does not start with an init entry".to_string(),
            ));
        }
    }

    for entry in rest {
        let WalEntryKind::BatchCommit {
            batch_index,
            mutations,
        } = &entry.kind
        else {
            return Err(StorageError::Corruption(format!(
                "unexpected init entry at sequence {}",
                entry.sequence
            )));
        };
        for mutation in mutations {
            graph.apply(mutation)?;
        }
        graph.set_version(graph.version() + 1);
        debug!(
            sequence = entry.sequence,
            batch = batch_index,
            mutations = mutations.len(),
            "replayed batch"
        );
    }

    Ok(graph)
}

impl GraphStore for PersistentGraphStore {
    fn policy(&self) -> MergePolicy {
        self.policy
    }

    fn snapshot(&self) -> Result<Arc<Graph>, StorageError> {
        self.snapshots.load()
    }

    fn commit(&self, batch: CommitBatch) -> Result<(), StorageError> {
        self.snapshots.commit(batch, |batch_index, mutations| {
            self.wal
                .append(WalEntryKind::BatchCommit {
                    batch_index,
                    mutations: mutations.to_vec(),
                })
                .map(|_| ())
        })
    }
}
