//! Input records and the record normalizer.
//!
//! A [`RawRecord`] is one row produced by an external reader. [`normalize`]
//! trims it and decides whether it may produce a relationship. Endpoints with a
//! usable name are resolved into entities even when the relationship is
//! rejected.

use std::io::Read;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityKey;
use crate::error::ValidationError;

/// Length of generated record ids.
pub const GENERATED_ID_LEN: usize = 8;

/// One raw triple record. Every field is untrimmed text; missing fields
/// deserialize as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    /// Subject entity name.
    pub head: String,
    /// Subject entity type.
    pub head_type: String,
    /// Object entity name.
    pub tail: String,
    /// Object entity type.
    pub tail_type: String,
    /// Relation label, directed from head to tail.
    pub relation: String,
    /// Supporting text; empty when none was extracted.
    pub evidence: String,
    /// Source record id; empty when the reader had none.
    pub id: String,
}

impl RawRecord {
    /// Creates a record with the given triple and no provenance.
    #[must_use]
    pub fn triple(
        head: impl Into<String>,
        head_type: impl Into<String>,
        relation: impl Into<String>,
        tail: impl Into<String>,
        tail_type: impl Into<String>,
    ) -> Self {
        Self {
            head: head.into(),
            head_type: head_type.into(),
            tail: tail.into(),
            tail_type: tail_type.into(),
            relation: relation.into(),
            evidence: String::new(),
            id: String::new(),
        }
    }

    /// Sets the evidence text.
    #[must_use]
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }

    /// Sets the source record id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// A trimmed record. Empty evidence and id are represented as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Trimmed head name.
    pub head: String,
    /// Trimmed head type.
    pub head_type: String,
    /// Trimmed tail name.
    pub tail: String,
    /// Trimmed tail type.
    pub tail_type: String,
    /// Trimmed relation label.
    pub relation: String,
    /// Evidence text, if any remained after trimming.
    pub evidence: Option<String>,
    /// Source record id, if any remained after trimming.
    pub id: Option<String>,
}

impl NormalizedRecord {
    /// Key for the head entity, or `None` when the head name is empty.
    #[must_use]
    pub fn head_key(&self) -> Option<EntityKey> {
        endpoint_key(&self.head, &self.head_type)
    }

    /// Key for the tail entity, or `None` when the tail name is empty.
    #[must_use]
    pub fn tail_key(&self) -> Option<EntityKey> {
        endpoint_key(&self.tail, &self.tail_type)
    }
}

fn endpoint_key(name: &str, entity_type: &str) -> Option<EntityKey> {
    (!name.is_empty()).then(|| EntityKey::new(name, entity_type))
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// The trimmed record.
    pub record: NormalizedRecord,
    /// Why the record may not produce a relationship, if it may not.
    pub rejection: Option<ValidationError>,
}

impl Normalized {
    /// Returns true if this record may create or update a relationship.
    #[must_use]
    pub fn is_relationship_eligible(&self) -> bool {
        self.rejection.is_none()
    }
}

fn trimmed(s: &str) -> String {
    s.trim().to_string()
}

fn trimmed_opt(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn check_required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::missing(field));
    }
    Ok(())
}

/// Trims every field of `raw` and classifies it.
///
/// The relationship is rejected when `relation`, `head` or `tail` is empty
/// after trimming (checked in that order).
#[must_use]
pub fn normalize(raw: &RawRecord) -> Normalized {
    let record = NormalizedRecord {
        head: trimmed(&raw.head),
        head_type: trimmed(&raw.head_type),
        tail: trimmed(&raw.tail),
        tail_type: trimmed(&raw.tail_type),
        relation: trimmed(&raw.relation),
        evidence: trimmed_opt(&raw.evidence),
        id: trimmed_opt(&raw.id),
    };

    let rejection = check_required("relation", &record.relation)
        .and_then(|()| check_required("head", &record.head))
        .and_then(|()| check_required("tail", &record.tail))
        .err();

    Normalized { record, rejection }
}

/// A triplet as emitted by an LLM extraction step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedTriplet {
    /// Becomes the record head.
    pub subject: String,
    /// Becomes the head type.
    pub subject_type: String,
    /// Becomes the relation label.
    pub relation_type: String,
    /// Becomes the record tail.
    pub object: String,
    /// Becomes the tail type.
    pub object_type: String,
    /// Sentence the triplet was extracted from.
    pub evidence: String,
}

impl ExtractedTriplet {
    /// Maps this triplet onto an ingestion record with a fresh short id.
    #[must_use]
    pub fn into_record(self) -> RawRecord {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(GENERATED_ID_LEN);
        RawRecord {
            head: self.subject,
            head_type: self.subject_type,
            tail: self.object,
            tail_type: self.object_type,
            relation: self.relation_type,
            evidence: self.evidence,
            id,
        }
    }
}

/// Parses a JSON array of extracted triplets.
///
/// # Errors
/// Returns [`ValidationError::MalformedInput`] if the input is not a JSON
/// array of triplet objects.
pub fn load_triplets_json(reader: impl Read) -> Result<Vec<ExtractedTriplet>, ValidationError> {
    serde_json::from_reader(reader).map_err(|e| ValidationError::MalformedInput {
        reason: format!("invalid triplet JSON: {e}"),
    })
}
