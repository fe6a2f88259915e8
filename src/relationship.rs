//! Relationship (edge) types and the merge policy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Dense, stable edge identifier (index into the edge arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(u32);

impl EdgeId {
    /// Creates an edge ID from a raw arena index.
    #[must_use]
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// How repeated `(head, tail)` pairs are merged.
///
/// `Collapse` keys an edge on the ordered entity pair only, so a second record
/// with a different relation label replaces the first edge's label, evidence
/// and record id. `MultiEdge` adds the relation label to the key, keeping one
/// edge per distinct label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// One edge per ordered `(head, tail)` pair.
    #[default]
    Collapse,
    /// One edge per ordered `(head, tail)` pair and relation label.
    MultiEdge,
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collapse => write!(f, "collapse"),
            Self::MultiEdge => write!(f, "multi_edge"),
        }
    }
}

/// Merge identity of an edge under a given policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct EdgeKey {
    head: EntityId,
    tail: EntityId,
    relation: Option<String>,
}

impl EdgeKey {
    pub(crate) fn new(policy: MergePolicy, head: EntityId, tail: EntityId, relation: &str) -> Self {
        let relation = match policy {
            MergePolicy::Collapse => None,
            MergePolicy::MultiEdge => Some(relation.to_string()),
        };
        Self {
            head,
            tail,
            relation,
        }
    }
}

/// A directed, attributed edge from `head` to `tail`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    /// Arena id.
    pub id: EdgeId,
    /// Source entity.
    pub head: EntityId,
    /// Target entity.
    pub tail: EntityId,
    /// Relation label from the last merge.
    pub relation: String,

    /// Evidence text from the last merge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,

    /// Source record id from the last merge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl Relationship {
    /// Returns the endpoint opposite to `entity`, if `entity` is an endpoint.
    #[must_use]
    pub fn other_end(&self, entity: EntityId) -> Option<EntityId> {
        if self.head == entity {
            Some(self.tail)
        } else if self.tail == entity {
            Some(self.head)
        } else {
            None
        }
    }

    /// Returns true if head and tail are the same entity.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.head == self.tail
    }
}
