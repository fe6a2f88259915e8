//! Error types for kgraph.
//!
//! All errors in kgraph are strongly typed using thiserror.
//! Record-level validation problems are recovered locally by the ingestor;
//! everything else is surfaced through [`GraphError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors raised for a single input record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// A required field was empty after trimming.
    #[error("Required field '{field}' is empty")]
    MissingField {
        /// Name of the empty field.
        field: String,
    },

    /// The input could not be parsed.
    #[error("Malformed input: {reason}")]
    MalformedInput {
        /// Parser message.
        reason: String,
    },
}

impl ValidationError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }
}

/// Errors surfaced by an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A batch failed to apply or commit. Its effects were rolled back; all
    /// earlier batches remain committed.
    #[error(
        "Batch {batch_index} failed at record {record_offset}{}: {source} (resume from offset {resume_offset})",
        fmt_record_id(.record_id)
    )]
    BatchCommitFailure {
        /// Zero-based index of the failed batch.
        batch_index: u64,
        /// Offset of the failed batch's first record; re-run from here.
        resume_offset: u64,
        /// Offset of the record being applied when the batch failed.
        record_offset: u64,
        /// Source id of that record, if it had one.
        record_id: Option<String>,
        /// Batches committed by this run before the failure.
        committed_batches: u64,
        /// The underlying store failure.
        #[source]
        source: StorageError,
    },

    /// The ingest configuration was rejected.
    #[error("Invalid ingest configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },
}

fn fmt_record_id(record_id: &Option<String>) -> String {
    record_id
        .as_deref()
        .map(|id| format!(" (id {id})"))
        .unwrap_or_default()
}

/// Errors raised while evaluating a traversal query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A request or limit field is out of range.
    #[error("Invalid argument '{field}': {reason}")]
    InvalidArgument {
        /// Offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl QueryError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Execution errors raised by the worker runtime.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The caller stopped waiting for a result.
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        /// How long the caller waited.
        duration_ms: u64,
    },

    /// A worker queue had no free slot.
    #[error("Execution queue is full (path: {path}, capacity: {capacity})")]
    QueueFull {
        /// Queue that was full.
        path: String,
        /// Its capacity.
        capacity: usize,
    },

    /// A worker went away before answering.
    #[error("Execution worker disconnected (path: {path})")]
    Disconnected {
        /// Queue the job was sent to.
        path: String,
    },
}

/// Top-level error type for kgraph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Record-level validation failure.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Ingestion run failure.
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Malformed query.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Worker runtime failure.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Invariant violation inside kgraph.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the violation.
        message: String,
    },
}

impl GraphError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an ingestion error.
    #[must_use]
    pub const fn is_ingest(&self) -> bool {
        matches!(self, Self::Ingest(_))
    }

    /// Returns true if this is a malformed query.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::Query(QueryError::InvalidArgument { .. }))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if retrying the same call can succeed.
    ///
    /// Batch commit failures are retryable because re-resolution is idempotent.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Ingest(IngestError::BatchCommitFailure { .. }) => true,
            Self::Execution(e) => matches!(
                e,
                ExecutionError::Timeout { .. } | ExecutionError::QueueFull { .. }
            ),
            _ => false,
        }
    }
}

/// Result type alias for kgraph operations.
pub type GraphResult<T> = Result<T, GraphError>;
