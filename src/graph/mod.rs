//! The graph arena.
//!
//! [`Graph`] owns every entity and relationship and keeps the indices both
//! ingestion and traversal need:
//! - `(name, type)` → entity, for resolution
//! - `name` → entities, for homonym lookup at query time
//! - per-entity outgoing and incoming edge lists, in edge creation order
//! - edge merge key → edge, for relationship upserts
//!
//! A `Graph` is a plain value. Sharing and publication are handled by
//! [`crate::storage::GraphStore`], which hands out immutable snapshots.
//! Ingestion stages each batch in a [`StagedGraph`] overlay on the latest
//! snapshot.

mod merge;
mod resolve;
mod staged;

pub use staged::StagedGraph;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityKey};
use crate::relationship::{EdgeId, EdgeKey, MergePolicy, Relationship};
use crate::storage::StorageError;

/// A single logged graph mutation.
///
/// Mutations are keyed by entity identity rather than by dense id so that
/// replaying them against any graph built under the same policy reproduces
/// the same state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// An entity created by resolution.
    ResolveEntity {
        /// Identity of the created entity.
        key: EntityKey,
    },
    /// A relationship merge; its endpoints are resolved on replay.
    MergeRelationship {
        /// Head endpoint.
        head: EntityKey,
        /// Tail endpoint.
        tail: EntityKey,
        /// Relation label written by the merge.
        relation: String,
        /// Evidence written by the merge.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        evidence: Option<String>,
        /// Record id written by the merge.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record_id: Option<String>,
    },
}

/// Entity and relationship counts of a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    /// Number of entities.
    pub entities: usize,
    /// Number of relationships.
    pub relationships: usize,
    /// Number of batches committed into this graph.
    pub batches: u64,
}

/// In-memory property graph with dense ids and adjacency indices.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    policy: MergePolicy,
    version: u64,
    entities: Vec<Entity>,
    by_key: HashMap<EntityKey, EntityId>,
    by_name: HashMap<String, Vec<EntityId>>,
    edges: Vec<Relationship>,
    edge_index: HashMap<EdgeKey, EdgeId>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
}

impl Graph {
    /// Creates an empty graph that merges relationships under `policy`.
    #[must_use]
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// The merge policy this graph was created with.
    #[must_use]
    pub const fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Number of batches committed into this graph.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Number of entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of relationships.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns the entity with the given id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index())
    }

    /// Returns the relationship with the given id.
    #[must_use]
    pub fn relationship(&self, id: EdgeId) -> Option<&Relationship> {
        self.edges.get(id.index())
    }

    /// Looks up an entity by its exact `(name, type)` identity.
    #[must_use]
    pub fn find(&self, name: &str, entity_type: &str) -> Option<EntityId> {
        self.by_key.get(&EntityKey::new(name, entity_type)).copied()
    }

    /// All entities with the given name, in id order.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> &[EntityId] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// Edges whose head is `id`, in creation order.
    #[must_use]
    pub fn outgoing(&self, id: EntityId) -> &[EdgeId] {
        self.outgoing.get(id.index()).map_or(&[], Vec::as_slice)
    }

    /// Edges whose tail is `id`, in creation order.
    #[must_use]
    pub fn incoming(&self, id: EntityId) -> &[EdgeId] {
        self.incoming.get(id.index()).map_or(&[], Vec::as_slice)
    }

    /// Looks up the edge from `head` to `tail` that a merge with `relation`
    /// would update.
    #[must_use]
    pub fn find_edge(&self, head: EntityId, tail: EntityId, relation: &str) -> Option<EdgeId> {
        self.edge_index
            .get(&EdgeKey::new(self.policy, head, tail, relation))
            .copied()
    }

    /// All entities, in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// All relationships, in id order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.edges.iter()
    }

    /// Counts and version of this graph.
    #[must_use]
    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            entities: self.entities.len(),
            relationships: self.edges.len(),
            batches: self.version,
        }
    }

    /// Applies one logged mutation.
    ///
    /// # Errors
    /// Propagates resolver and merger failures.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<(), StorageError> {
        match mutation {
            Mutation::ResolveEntity { key } => {
                self.resolve(&key.name, &key.entity_type)?;
            }
            Mutation::MergeRelationship {
                head,
                tail,
                relation,
                evidence,
                record_id,
            } => {
                let head = self.resolve(&head.name, &head.entity_type)?;
                let tail = self.resolve(&tail.name, &tail.entity_type)?;
                self.merge(head, tail, relation, evidence.as_deref(), record_id.as_deref())?;
            }
        }
        Ok(())
    }

    /// Content digest of the graph that ignores id assignment order.
    ///
    /// Two graphs holding the same entities and the same relationships (by
    /// endpoint identity, label, evidence and record id) have equal
    /// fingerprints.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut keys: Vec<&Entity> = self.entities.iter().collect();
        keys.sort_by(|a, b| (&a.name, &a.entity_type).cmp(&(&b.name, &b.entity_type)));

        let mut edges: Vec<(&Entity, &Entity, &Relationship)> = self
            .edges
            .iter()
            .filter_map(|rel| Some((self.entity(rel.head)?, self.entity(rel.tail)?, rel)))
            .collect();
        edges.sort_by(|(ha, ta, ra), (hb, tb, rb)| {
            (&ha.name, &ha.entity_type, &ta.name, &ta.entity_type, &ra.relation)
                .cmp(&(&hb.name, &hb.entity_type, &tb.name, &tb.entity_type, &rb.relation))
        });

        let mut hasher = blake3::Hasher::new();
        hasher.update(self.policy.to_string().as_bytes());
        for e in keys {
            hash_field(&mut hasher, b'E', &e.name);
            hash_field(&mut hasher, b't', &e.entity_type);
        }
        for (head, tail, rel) in edges {
            hash_field(&mut hasher, b'R', &head.name);
            hash_field(&mut hasher, b't', &head.entity_type);
            hash_field(&mut hasher, b'h', &tail.name);
            hash_field(&mut hasher, b't', &tail.entity_type);
            hash_field(&mut hasher, b'l', &rel.relation);
            hash_field(&mut hasher, b'v', rel.evidence.as_deref().unwrap_or(""));
            hash_field(&mut hasher, b'i', rel.record_id.as_deref().unwrap_or(""));
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn hash_field(hasher: &mut blake3::Hasher, tag: u8, value: &str) {
    hasher.update(&[tag]);
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}
