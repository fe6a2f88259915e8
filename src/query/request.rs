//! Traversal requests and their builder.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Largest accepted hop bound.
pub const MAX_HOPS: i64 = 64;

/// Which incident edges a traversal may follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Edges whose head is the expanding entity.
    Outgoing,
    /// Edges whose tail is the expanding entity.
    Incoming,
    /// Both.
    #[default]
    Both,
}

impl Direction {
    /// Whether outgoing edges are followed.
    #[must_use]
    pub const fn follows_outgoing(self) -> bool {
        matches!(self, Self::Outgoing | Self::Both)
    }

    /// Whether incoming edges are followed.
    #[must_use]
    pub const fn follows_incoming(self) -> bool {
        matches!(self, Self::Incoming | Self::Both)
    }
}

/// Direction of a traversed edge relative to the entity it was expanded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    /// The expanding entity is the edge head.
    Outgoing,
    /// The expanding entity is the edge tail.
    Incoming,
}

const fn default_max_hops() -> i64 {
    1
}

/// A bounded-hop traversal query.
///
/// `max_hops` is signed so that out-of-range values arriving over the wire
/// are reported as invalid arguments rather than failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalRequest {
    /// Name of the start entities; surrounding whitespace is ignored.
    pub name: String,

    /// Restricts the start entities to this type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Edges to follow (default: both).
    #[serde(default)]
    pub direction: Direction,

    /// Relation labels that may be traversed; `None` allows all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<BTreeSet<String>>,

    /// Hop bound (default: 1).
    #[serde(default = "default_max_hops")]
    pub max_hops: i64,

    /// Caller deadline for the query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl TraversalRequest {
    /// A one-hop, both-directions request for every entity named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: None,
            direction: Direction::default(),
            relations: None,
            max_hops: default_max_hops(),
            timeout_ms: None,
        }
    }

    /// Starts a builder for `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> TraversalBuilder {
        TraversalBuilder::new(name)
    }

    /// Checks the request.
    ///
    /// # Errors
    /// [`QueryError::InvalidArgument`] if the name is blank, `max_hops` is
    /// outside `1..=MAX_HOPS`, or the relation allow-set is empty.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.name.trim().is_empty() {
            return Err(QueryError::invalid("name", "must not be empty"));
        }
        if self.max_hops < 1 {
            return Err(QueryError::invalid(
                "max_hops",
                format!("must be at least 1 (got {})", self.max_hops),
            ));
        }
        if self.max_hops > MAX_HOPS {
            return Err(QueryError::invalid(
                "max_hops",
                format!("must be at most {MAX_HOPS} (got {})", self.max_hops),
            ));
        }
        if self.relations.as_ref().is_some_and(BTreeSet::is_empty) {
            return Err(QueryError::invalid(
                "relations",
                "allow-set must not be empty; omit it to allow every relation",
            ));
        }
        Ok(())
    }

    /// Hop bound as a count. Only meaningful after [`validate`](Self::validate).
    pub(crate) fn hops(&self) -> usize {
        usize::try_from(self.max_hops.clamp(0, MAX_HOPS)).unwrap_or(0)
    }

    pub(crate) fn allows_relation(&self, relation: &str) -> bool {
        self.relations
            .as_ref()
            .map_or(true, |allowed| allowed.contains(relation))
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Builder for [`TraversalRequest`].
///
/// # Example
/// ```
/// use kgraph::query::{Direction, TraversalBuilder};
///
/// let request = TraversalBuilder::new("wing")
///     .entity_type("Component")
///     .direction(Direction::Outgoing)
///     .relation("part_of")
///     .max_hops(2)
///     .build()
///     .unwrap();
/// assert_eq!(request.max_hops, 2);
/// ```
#[derive(Debug, Clone)]
pub struct TraversalBuilder {
    request: TraversalRequest,
}

impl TraversalBuilder {
    /// Starts from the defaults of [`TraversalRequest::new`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            request: TraversalRequest::new(name),
        }
    }

    /// Only start from entities of this type.
    #[must_use]
    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.request.entity_type = Some(entity_type.into());
        self
    }

    /// Edge direction to follow (default: both).
    #[must_use]
    pub fn direction(mut self, direction: Direction) -> Self {
        self.request.direction = direction;
        self
    }

    /// Adds one label to the relation allow-set.
    #[must_use]
    pub fn relation(mut self, relation: impl Into<String>) -> Self {
        self.request
            .relations
            .get_or_insert_with(BTreeSet::new)
            .insert(relation.into());
        self
    }

    /// Replaces the relation allow-set.
    #[must_use]
    pub fn relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.relations = Some(relations.into_iter().map(Into::into).collect());
        self
    }

    /// Hop bound (default: 1).
    #[must_use]
    pub fn max_hops(mut self, max_hops: i64) -> Self {
        self.request.max_hops = max_hops;
        self
    }

    /// Caller deadline.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Validates and returns the request.
    ///
    /// # Errors
    /// See [`TraversalRequest::validate`].
    pub fn build(self) -> Result<TraversalRequest, QueryError> {
        self.request.validate()?;
        Ok(self.request)
    }
}
