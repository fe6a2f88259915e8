//! Traversal results.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};
use crate::relationship::EdgeId;

use super::request::EdgeDirection;

/// An entity as it appears in query output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Arena id in the queried snapshot.
    pub id: EntityId,
    /// Entity name.
    pub name: String,
    /// Type tag; may be empty.
    pub entity_type: String,
}

impl From<&Entity> for EntityRef {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            name: entity.name.clone(),
            entity_type: entity.entity_type.clone(),
        }
    }
}

/// An entity reached by a neighborhood query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachedEntity {
    /// The entity.
    pub entity: EntityRef,
    /// Hop distance from the nearest start; starts are at hop 0.
    pub hop: usize,
}

/// One edge of a neighborhood.
///
/// `source` and `target` are always the edge's head and tail; `direction`
/// says how the edge was entered from the entity being expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborEdge {
    /// Edge id in the queried snapshot.
    pub edge: EdgeId,
    /// The edge head.
    pub source: EntityRef,
    /// Relation label.
    pub relation: String,
    /// The edge tail.
    pub target: EntityRef,
    /// How the edge was entered.
    pub direction: EdgeDirection,
    /// Hop at which the edge was traversed (1-based).
    pub hop: usize,
    /// Evidence text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    /// Source record id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

/// Result of an ego-neighborhood query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighborhood {
    /// Entities matching the requested name (and type), in id order.
    pub starts: Vec<EntityRef>,
    /// Every reached entity, ordered by hop and then discovery.
    pub entities: Vec<ReachedEntity>,
    /// Every traversed edge, ordered by hop and then discovery.
    pub edges: Vec<NeighborEdge>,
    /// True if a limit or deadline stopped the expansion early.
    pub truncated: bool,
}

impl Neighborhood {
    /// True when no entity matched the request.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.starts.is_empty()
    }

    /// Edges as `(source, relation, target, direction)` tuples.
    #[must_use]
    pub fn triples(&self) -> Vec<(&str, &str, &str, EdgeDirection)> {
        self.edges
            .iter()
            .map(|e| {
                (
                    e.source.name.as_str(),
                    e.relation.as_str(),
                    e.target.name.as_str(),
                    e.direction,
                )
            })
            .collect()
    }
}

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    /// Edge followed by this step.
    pub edge: EdgeId,
    /// Entity the step leaves.
    pub from: EntityRef,
    /// Relation label of the edge.
    pub relation: String,
    /// Entity the step reaches.
    pub to: EntityRef,
    /// `Outgoing` if the step follows the edge head → tail.
    pub direction: EdgeDirection,
}

/// A simple path from a start entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphPath {
    /// Steps from the start entity onwards.
    pub steps: Vec<PathStep>,
    /// Number of steps.
    pub hops: usize,
}

impl GraphPath {
    /// Names along the path, start first.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.steps.len() + 1);
        if let Some(first) = self.steps.first() {
            names.push(first.from.name.as_str());
        }
        names.extend(self.steps.iter().map(|s| s.to.name.as_str()));
        names
    }
}

/// Result of a bounded path enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSet {
    /// Entities matching the requested name (and type), in id order.
    pub starts: Vec<EntityRef>,
    /// Paths ordered by hop count and then discovery.
    pub paths: Vec<GraphPath>,
    /// True if a limit or deadline stopped the enumeration early.
    pub truncated: bool,
}

impl PathSet {
    /// True when no path was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
