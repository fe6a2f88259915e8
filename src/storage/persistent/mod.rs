//! Persistent storage backend for kgraph.
//!
//! This module provides durable, crash-safe storage with:
//! - a write-ahead log of committed batches, replayed on open
//! - an exclusive directory lock for single-process access
//! - CRC32 checksums for corruption detection
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             PersistentGraphStore             │
//! ├──────────────────────────────────────────────┤
//! │  SnapshotCell     (published + spare graph)  │
//! │           ↑ swap after append                │
//! │  WriteAheadLog        (append-only batches)  │
//! │  FileLock             (flock / LockFileEx)   │
//! └──────────────────────────────────────────────┘
//! ```

mod codec;
mod file_lock;
mod store;
mod wal;

pub use file_lock::{FileLock, LOCK_FILE_NAME};
pub use store::PersistentGraphStore;
pub use wal::{WalEntry, WalEntryKind, WriteAheadLog};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::relationship::MergePolicy;

/// Configuration for persistent storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentConfig {
    /// Whether to fsync after every commit (slower but safer).
    pub sync_on_write: bool,
    /// File name of the write-ahead log inside the graph directory.
    pub wal_file_name: String,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            wal_file_name: "graph.wal".to_string(),
        }
    }
}

impl PersistentConfig {
    /// Checks the configuration.
    ///
    /// # Errors
    /// [`GraphError::Internal`] if the log file name is empty, contains a path
    /// separator, or collides with the lock file.
    pub fn validate(self) -> Result<Self, GraphError> {
        let name = self.wal_file_name.as_str();
        if name.is_empty() || name == "." || name == ".." {
            return Err(GraphError::internal(format!(
                "wal_file_name must be a file name (got {name:?})"
            )));
        }
        if name.contains(['/', '\\']) {
            return Err(GraphError::internal(format!(
                "wal_file_name must not contain path separators (got {name:?})"
            )));
        }
        if name == LOCK_FILE_NAME {
            return Err(GraphError::internal(format!(
                "wal_file_name must differ from the lock file {LOCK_FILE_NAME:?}"
            )));
        }
        Ok(self)
    }
}

/// Open or create a persistent graph at the given directory.
///
/// # Errors
/// - If the configuration is invalid
/// - If the directory cannot be created or another process holds the lock
/// - If the log was written under a different merge policy or fails
///   validation
///
/// # Example
/// ```rust,ignore
/// use kgraph::storage::persistent::open_database;
///
/// let store = Arc::new(open_database("./graph.kg", MergePolicy::Collapse, None)?);
/// let ingestor = Ingestor::new(store.clone(), IngestConfig::default())?;
/// ```
pub fn open_database(
    path: impl AsRef<Path>,
    policy: MergePolicy,
    config: Option<PersistentConfig>,
) -> Result<PersistentGraphStore, GraphError> {
    let cfg = config.unwrap_or_default().validate()?;
    Ok(PersistentGraphStore::open(path.as_ref(), policy, &cfg)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PersistentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_wal_names() {
        for name in ["", "..", "logs/graph.wal", LOCK_FILE_NAME] {
            let cfg = PersistentConfig {
                wal_file_name: name.to_string(),
                ..PersistentConfig::default()
            };
            assert!(cfg.validate().is_err(), "{name:?} should be rejected");
        }
    }
}
