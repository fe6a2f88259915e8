//! Batched triple ingestion.
//!
//! [`Ingestor::ingest`] normalizes each raw record, resolves its endpoints,
//! merges its relationship, and commits the work in fixed-size batches. Each
//! batch is atomic: a failure discards the batch and stops the run, leaving
//! every earlier batch committed.

mod transaction;

pub use transaction::BatchTransaction;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use crate::config::IngestConfig;
use crate::entity::EntityKey;
use crate::error::{GraphResult, IngestError, ValidationError};
use crate::record::{normalize, ExtractedTriplet, RawRecord};
use crate::storage::{GraphStore, StorageError};

/// A record whose relationship was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Zero-based position of the record in the input.
    pub offset: u64,
    /// Trimmed source id of the record, if it had one.
    pub record_id: Option<String>,
    /// Why the relationship was skipped.
    pub reason: ValidationError,
}

/// Outcome of a successful ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Batches committed by this run.
    pub batches_committed: u64,
    /// Records consumed from the input.
    pub records_seen: u64,
    /// Merge calls made (creates and updates).
    pub relationships_merged: u64,
    /// Endpoint resolutions performed.
    pub entities_resolved: u64,
    /// Entities that did not exist before this run.
    pub entities_created: u64,
    /// Records whose relationship was skipped, in input order.
    pub rejected: Vec<RejectedRecord>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the last batch was committed.
    pub finished_at: DateTime<Utc>,
}

impl IngestReport {
    fn started() -> Self {
        let now = Utc::now();
        Self {
            batches_committed: 0,
            records_seen: 0,
            relationships_merged: 0,
            entities_resolved: 0,
            entities_created: 0,
            rejected: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }
}

#[derive(Debug, Default)]
struct BatchStats {
    merged: u64,
    resolved: u64,
    created: u64,
    rejected: Vec<RejectedRecord>,
}

struct BatchFailure {
    record_offset: u64,
    record_id: Option<String>,
    source: StorageError,
}

/// Single-writer ingestion driver over a [`GraphStore`].
pub struct Ingestor {
    store: Arc<dyn GraphStore>,
    config: IngestConfig,
}

impl Ingestor {
    /// Creates an ingestor writing into `store`.
    ///
    /// # Errors
    /// - [`IngestError::InvalidConfig`] if the configuration is invalid
    /// - [`StorageError::PolicyMismatch`] if the store was created under a
    ///   different merge policy than the configured one
    pub fn new(store: Arc<dyn GraphStore>, config: IngestConfig) -> GraphResult<Self> {
        let config = config.validate()?;
        if store.policy() != config.merge_policy {
            return Err(StorageError::PolicyMismatch {
                stored: store.policy(),
                configured: config.merge_policy,
            }
            .into());
        }
        Ok(Self { store, config })
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// The store being written.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Ingests `records` in order.
    ///
    /// Records are pulled lazily, one batch at a time. Records rejected by the
    /// normalizer are listed in the report; their endpoints are still
    /// resolved when named.
    ///
    /// # Errors
    /// [`IngestError::BatchCommitFailure`] for the first batch that fails;
    /// the failed batch has no visible effect.
    pub fn ingest<I>(&self, records: I) -> GraphResult<IngestReport>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut report = IngestReport::started();
        let mut records = records.into_iter();
        let mut batch = Vec::with_capacity(self.config.batch_size);

        loop {
            batch.clear();
            batch.extend(records.by_ref().take(self.config.batch_size));
            if batch.is_empty() {
                break;
            }

            let index = report.batches_committed;
            let start = report.records_seen;
            let stats = self.apply_batch(index, start, &batch).map_err(|failure| {
                IngestError::BatchCommitFailure {
                    batch_index: index,
                    resume_offset: start,
                    record_offset: failure.record_offset,
                    record_id: failure.record_id,
                    committed_batches: report.batches_committed,
                    source: failure.source,
                }
            })?;

            report.batches_committed += 1;
            report.records_seen += batch.len() as u64;
            report.relationships_merged += stats.merged;
            report.entities_resolved += stats.resolved;
            report.entities_created += stats.created;
            report.rejected.extend(stats.rejected);
        }

        report.finished_at = Utc::now();
        info!(
            batches = report.batches_committed,
            records = report.records_seen,
            merged = report.relationships_merged,
            rejected = report.rejected.len(),
            "ingestion finished"
        );
        Ok(report)
    }

    /// Maps extracted triplets onto records and ingests them.
    ///
    /// # Errors
    /// See [`ingest`](Self::ingest).
    pub fn ingest_triplets<I>(&self, triplets: I) -> GraphResult<IngestReport>
    where
        I: IntoIterator<Item = ExtractedTriplet>,
    {
        self.ingest(triplets.into_iter().map(ExtractedTriplet::into_record))
    }

    fn apply_batch(
        &self,
        index: u64,
        start: u64,
        batch: &[RawRecord],
    ) -> Result<BatchStats, BatchFailure> {
        let span = info_span!("ingest_batch", batch = index, records = batch.len());
        let _enter = span.enter();

        let fail_at = |offset: u64, raw: Option<&RawRecord>| {
            let record_id = raw
                .map(|r| r.id.trim())
                .filter(|id| !id.is_empty())
                .map(str::to_string);
            move |source: StorageError| BatchFailure {
                record_offset: offset,
                record_id,
                source,
            }
        };

        let mut tx = BatchTransaction::begin(self.store.as_ref(), index)
            .map_err(fail_at(start, batch.first()))?;
        let mut stats = BatchStats::default();

        for (offset, raw) in (start..).zip(batch) {
            apply_record(&mut tx, offset, raw, &mut stats).map_err(fail_at(offset, Some(raw)))?;
        }

        let last = start + batch.len() as u64 - 1;
        tx.commit().map_err(fail_at(last, batch.last()))?;
        debug!(merged = stats.merged, created = stats.created, "batch committed");
        Ok(stats)
    }
}

fn apply_record(
    tx: &mut BatchTransaction<'_>,
    offset: u64,
    raw: &RawRecord,
    stats: &mut BatchStats,
) -> Result<(), StorageError> {
    let normalized = normalize(raw);
    let record = &normalized.record;

    let mut resolve = |key: Option<EntityKey>| -> Result<_, StorageError> {
        let Some(key) = key else {
            return Ok(None);
        };
        let (id, created) = tx.resolve(&key)?;
        stats.resolved += 1;
        stats.created += u64::from(created);
        Ok(Some(id))
    };
    let head = resolve(record.head_key())?;
    let tail = resolve(record.tail_key())?;

    if let Some(reason) = normalized.rejection {
        debug!(offset, record_id = ?record.id, %reason, "record rejected");
        stats.rejected.push(RejectedRecord {
            offset,
            record_id: normalized.record.id,
            reason,
        });
        return Ok(());
    }

    if let (Some(head), Some(tail)) = (head, tail) {
        tx.merge(
            head,
            tail,
            &record.relation,
            record.evidence.as_deref(),
            record.id.as_deref(),
        )?;
        stats.merged += 1;
    }
    Ok(())
}
