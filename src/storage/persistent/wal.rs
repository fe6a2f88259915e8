//! Write-ahead log of committed batches.
//!
//! The log is the source of truth for the persistent store: a batch is
//! durable once its entry is appended, and the in-memory graph is rebuilt on
//! open by replaying every entry in order.
//!
//! # File Format
//! ```text
//! [MAGIC: 4 bytes][VERSION: 1 byte]
//! [ENTRY 1: codec frame holding a WalEntry]
//! [ENTRY 2: codec frame holding a WalEntry]
//! ...
//! ```
//!
//! The first entry is always [`WalEntryKind::Init`], recording the merge
//! policy the graph was created with.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::graph::Mutation;
use crate::relationship::MergePolicy;
use crate::storage::StorageError;

use super::codec;

const HEADER_LEN: u64 = 5;

/// A single entry in the write-ahead log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonically increasing sequence number, starting at 1.
    pub sequence: u64,
    /// When this entry was written.
    pub timestamp: DateTime<Utc>,
    /// What the entry records.
    pub kind: WalEntryKind,
}

/// What a log entry records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WalEntryKind {
    /// Graph creation.
    Init {
        /// Policy the graph was created with.
        merge_policy: MergePolicy,
    },
    /// One committed ingestion batch.
    BatchCommit {
        /// Index of the batch within its ingestion run.
        batch_index: u64,
        /// The batch's mutations, in order.
        mutations: Vec<Mutation>,
    },
}

#[derive(Debug)]
struct WalState {
    file: File,
    sequence: u64,
    /// Length of the file up to the end of the last complete entry.
    len: u64,
}

/// Append-only write-ahead log.
///
/// Thread-safe via internal mutex.
#[derive(Debug)]
pub struct WriteAheadLog {
    path: PathBuf,
    state: Mutex<WalState>,
    sync_on_write: bool,
}

impl WriteAheadLog {
    /// Opens or creates a log file.
    ///
    /// An entry cut short by a crash is discarded and the file is truncated
    /// back to the last complete entry. A file holding only part of the
    /// header is treated as empty.
    ///
    /// # Errors
    /// - [`StorageError::Corruption`] if the header or a complete entry fails
    ///   validation
    /// - [`StorageError::Io`] on file system failures
    pub fn open(path: &Path, sync_on_write: bool) -> Result<Self, StorageError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let (sequence, len) = if file_len < HEADER_LEN {
            let mut partial = Vec::new();
            file.read_to_end(&mut partial)?;
            if !codec::is_header_prefix(&partial) {
                return Err(StorageError::Corruption(format!(
                    "{}: not a kgraph log: found {partial:?}",
                    path.display()
                )));
            }
            if file_len > 0 {
                warn!(
                    path = %path.display(),
                    bytes = file_len,
                    "rewriting incomplete write-ahead log header"
                );
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
            }
            codec::write_header(&mut file)?;
            if sync_on_write {
                file.sync_all()?;
            }
            (0, HEADER_LEN)
        } else {
            let scan = scan(path)?;
            if scan.valid_len < file_len {
                warn!(
                    path = %path.display(),
                    sequence = scan.last_sequence,
                    discarded_bytes = file_len - scan.valid_len,
                    "truncating incomplete write-ahead log entry"
                );
                file.set_len(scan.valid_len)?;
                file.sync_all()?;
            }
            (scan.last_sequence, scan.valid_len)
        };

        let file = OpenOptions::new().append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(WalState {
                file,
                sequence,
                len,
            }),
            sync_on_write,
        })
    }

    /// Appends one entry and returns its sequence number.
    ///
    /// If the write fails the file is cut back to its previous length, so a
    /// failed append leaves no trace.
    ///
    /// # Errors
    /// - [`StorageError::Io`] if the entry cannot be encoded or written
    /// - [`StorageError::PoisonedLock`] if a writer panicked
    pub fn append(&self, kind: WalEntryKind) -> Result<u64, StorageError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StorageError::PoisonedLock("wal.append"))?;

        let sequence = state.sequence + 1;
        let frame = codec::encode(&WalEntry {
            sequence,
            timestamp: Utc::now(),
            kind,
        })?;

        if let Err(e) = write_frame(&mut state.file, &frame, self.sync_on_write) {
            let previous = state.len;
            if let Err(cleanup) = state.file.set_len(previous) {
                warn!(
                    path = %self.path.display(),
                    error = %cleanup,
                    "failed to roll back partial write-ahead log entry"
                );
            }
            return Err(e.into());
        }

        state.sequence = sequence;
        state.len += frame.len() as u64;
        Ok(sequence)
    }

    /// Reads every entry in order.
    ///
    /// # Errors
    /// [`StorageError::Corruption`] if any entry fails validation.
    pub fn entries(&self) -> Result<Vec<WalEntry>, StorageError> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        codec::read_header(&mut reader).map_err(|e| corruption(&self.path, &e))?;

        let mut entries = Vec::new();
        loop {
            match codec::decode::<WalEntry>(&mut reader) {
                Ok(entry) => entries.push(entry),
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(corruption(&self.path, &e)),
            }
        }
        Ok(entries)
    }

    /// Sequence number of the last appended entry.
    ///
    /// # Errors
    /// [`StorageError::PoisonedLock`] if a writer panicked.
    pub fn current_sequence(&self) -> Result<u64, StorageError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StorageError::PoisonedLock("wal.sequence"))?;
        Ok(state.sequence)
    }

    /// Log file size in bytes.
    ///
    /// # Errors
    /// [`StorageError::Io`] if the file cannot be inspected.
    pub fn size_bytes(&self) -> Result<u64, StorageError> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_frame(file: &mut File, frame: &[u8], sync: bool) -> std::io::Result<()> {
    file.write_all(frame)?;
    file.flush()?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}

fn corruption(path: &Path, err: &std::io::Error) -> StorageError {
    StorageError::Corruption(format!("{}: {err}", path.display()))
}

struct Scan {
    last_sequence: u64,
    valid_len: u64,
}

/// Walks the log, stopping at the first incomplete entry.
fn scan(path: &Path) -> Result<Scan, StorageError> {
    let mut reader = CountingReader::new(BufReader::new(File::open(path)?));
    codec::read_header(&mut reader).map_err(|e| corruption(path, &e))?;

    let mut scan = Scan {
        last_sequence: 0,
        valid_len: reader.count,
    };
    loop {
        match codec::decode::<WalEntry>(&mut reader) {
            Ok(entry) => {
                if entry.sequence != scan.last_sequence + 1 {
                    return Err(StorageError::Corruption(format!(
                        "{}: sequence {} follows {}",
                        path.display(),
                        entry.sequence,
                        scan.last_sequence
                    )));
                }
                scan.last_sequence = entry.sequence;
                scan.valid_len = reader.count;
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(scan),
            Err(e) => return Err(corruption(path, &e)),
        }
    }
}

struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }
}

impl<R: std::io::Read> std::io::Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::entity::EntityKey;

    fn batch(index: u64, name: &str) -> WalEntryKind {
        WalEntryKind::BatchCommit {
            batch_index: index,
            mutations: vec![Mutation::ResolveEntity {
                key: EntityKey::new(name, "Component"),
            }],
        }
    }

    #[test]
    fn test_wal_append_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.wal");

        let wal = WriteAheadLog::open(&path, false).unwrap();
        wal.append(WalEntryKind::Init {
            merge_policy: MergePolicy::Collapse,
        })
        .unwrap();
        wal.append(batch(0, "wing")).unwrap();
        assert_eq!(wal.current_sequence().unwrap(), 2);
        drop(wal);

        let wal = WriteAheadLog::open(&path, false).unwrap();
        assert_eq!(wal.current_sequence().unwrap(), 2);
        let entries = wal.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sequence, 1);
        assert!(matches!(entries[1].kind, WalEntryKind::BatchCommit { batch_index: 0, .. }));
    }

    #[test]
    fn test_torn_tail_is_truncated_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.wal");

        {
            let wal = WriteAheadLog::open(&path, true).unwrap();
            wal.append(batch(0, "wing")).unwrap();
            wal.append(batch(1, "flap")).unwrap();
        }
        let full = std::fs::metadata(&path).unwrap().len();
        let f = OpenOptions::new().write(true).open(&path).unwrap();
        f.set_len(full - 3).unwrap();
        drop(f);

        let wal = WriteAheadLog::open(&path, true).unwrap();
        assert_eq!(wal.current_sequence().unwrap(), 1);
        assert_eq!(wal.entries().unwrap().len(), 1);

        // Appends after recovery are readable.
        wal.append(batch(1, "flap")).unwrap();
        assert_eq!(wal.entries().unwrap().len(), 2);
    }

    #[test]
    fn test_checksum_failure_is_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.wal");
        {
            let wal = WriteAheadLog::open(&path, false).unwrap();
            wal.append(batch(0, "wing")).unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let err = WriteAheadLog::open(&path, false).unwrap_err();
        assert!(matches!(err, StorageError::Corruption(_)));
    }

    #[test]
    fn test_partial_header_is_rewritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.wal");
        std::fs::write(&path, b"KGR").unwrap();

        {
            let wal = WriteAheadLog::open(&path, false).unwrap();
            assert_eq!(wal.current_sequence().unwrap(), 0);
            assert!(wal.entries().unwrap().is_empty());
            wal.append(batch(0, "wing")).unwrap();
        }

        let wal = WriteAheadLog::open(&path, false).unwrap();
        assert_eq!(wal.current_sequence().unwrap(), 1);
        assert_eq!(wal.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_short_foreign_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.wal");
        std::fs::write(&path, b"{}").unwrap();

        let err = WriteAheadLog::open(&path, false).unwrap_err();
        assert!(matches!(err, StorageError::Corruption(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn test_foreign_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.wal");
        std::fs::write(&path, b"not a log at all").unwrap();

        let err = WriteAheadLog::open(&path, false).unwrap_err();
        assert!(matches!(err, StorageError::Corruption(_)));
    }
}
