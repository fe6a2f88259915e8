//! Typed configuration for ingestion, queries and the runtime.
//!
//! Every struct has sensible defaults, deserializes with missing fields
//! filled from those defaults, and is checked with `validate()` before use.

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, IngestError, QueryError};
use crate::relationship::MergePolicy;

/// Ingestion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Records per atomically committed batch.
    pub batch_size: usize,
    /// Merge policy the target store must have been created with.
    pub merge_policy: MergePolicy,
}

impl IngestConfig {
    /// Default records per batch.
    pub const DEFAULT_BATCH_SIZE: usize = 1000;

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the merge policy.
    #[must_use]
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// # Errors
    /// [`IngestError::InvalidConfig`] if `batch_size` is zero.
    pub fn validate(self) -> Result<Self, GraphError> {
        if self.batch_size == 0 {
            return Err(IngestError::InvalidConfig {
                reason: "batch_size must be at least 1".to_string(),
            }
            .into());
        }
        Ok(self)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::DEFAULT_BATCH_SIZE,
            merge_policy: MergePolicy::default(),
        }
    }
}

/// Safety bounds applied to every traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Maximum number of entity expansions per query before the result is
    /// truncated.
    pub max_visited: usize,
}

impl QueryLimits {
    /// Default expansion cap.
    pub const DEFAULT_MAX_VISITED: usize = 100_000;

    /// # Errors
    /// [`QueryError::InvalidArgument`] if `max_visited` is zero.
    pub fn validate(self) -> Result<Self, GraphError> {
        if self.max_visited == 0 {
            return Err(QueryError::invalid("max_visited", "must be at least 1").into());
        }
        Ok(self)
    }
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_visited: Self::DEFAULT_MAX_VISITED,
        }
    }
}

/// Worker runtime settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of query workers.
    pub reader_workers: usize,
    /// Maximum queued jobs per pool.
    pub queue_capacity: usize,
}

impl RuntimeConfig {
    /// # Errors
    /// [`GraphError::Internal`] if either value is zero.
    pub fn validate(self) -> Result<Self, GraphError> {
        if self.reader_workers == 0 {
            return Err(GraphError::internal("reader_workers must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(GraphError::internal("queue_capacity must be at least 1"));
        }
        Ok(self)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            reader_workers: 2,
            queue_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ingest = IngestConfig::default();
        assert_eq!(ingest.batch_size, 1000);
        assert_eq!(ingest.merge_policy, MergePolicy::Collapse);
        assert_eq!(QueryLimits::default().max_visited, 100_000);
        assert_eq!(RuntimeConfig::default().reader_workers, 2);
        assert_eq!(RuntimeConfig::default().queue_capacity, 1024);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = IngestConfig::default().with_batch_size(0).validate().unwrap_err();
        assert!(matches!(err, GraphError::Ingest(IngestError::InvalidConfig { .. })));
        assert!(IngestConfig::default().with_batch_size(1).validate().is_ok());
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let err = QueryLimits { max_visited: 0 }.validate().unwrap_err();
        assert!(err.is_invalid_argument());

        let runtime = RuntimeConfig {
            reader_workers: 0,
            ..RuntimeConfig::default()
        };
        assert!(runtime.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: IngestConfig = serde_json::from_str(r#"{"merge_policy":"multi_edge"}"#).unwrap();
        assert_eq!(cfg.batch_size, 1000);
        assert_eq!(cfg.merge_policy, MergePolicy::MultiEdge);

        let limits: QueryLimits = serde_json::from_str("{}").unwrap();
        assert_eq!(limits, QueryLimits::default());
    }
}
