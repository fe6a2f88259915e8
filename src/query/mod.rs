//! Traversal query engine.
//!
//! Queries run against an immutable snapshot taken from the [`GraphStore`]
//! when the query starts, so they never observe a partially applied batch
//! and never block ingestion.

mod request;
mod result;
mod traverse;

pub use request::{Direction, EdgeDirection, TraversalBuilder, TraversalRequest, MAX_HOPS};
pub use result::{EntityRef, GraphPath, NeighborEdge, Neighborhood, PathSet, PathStep, ReachedEntity};

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::config::QueryLimits;
use crate::error::GraphResult;
use crate::graph::Graph;
use crate::storage::GraphStore;

/// Read-only query entry point over a [`GraphStore`].
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn GraphStore>,
    limits: QueryLimits,
}

impl QueryEngine {
    /// # Errors
    /// Returns an error if `limits` is invalid.
    pub fn new(store: Arc<dyn GraphStore>, limits: QueryLimits) -> GraphResult<Self> {
        Ok(Self {
            store,
            limits: limits.validate()?,
        })
    }

    /// The validated limits.
    #[must_use]
    pub const fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// Ego neighborhood of every entity named by the request.
    ///
    /// # Errors
    /// - `QueryError::InvalidArgument` if the request is malformed
    /// - `StorageError` if no snapshot can be taken
    pub fn neighborhood(&self, req: &TraversalRequest) -> GraphResult<Neighborhood> {
        let (graph, deadline) = self.prepare(req)?;
        let result = traverse::neighborhood(&graph, req, &self.limits, deadline);
        if result.truncated {
            debug!(name = %req.name, edges = result.edges.len(), "neighborhood truncated");
        }
        Ok(result)
    }

    /// Simple paths of length `1..=max_hops` from every entity named by the
    /// request.
    ///
    /// # Errors
    /// Same as [`neighborhood`](Self::neighborhood).
    pub fn paths(&self, req: &TraversalRequest) -> GraphResult<PathSet> {
        let (graph, deadline) = self.prepare(req)?;
        let result = traverse::paths(&graph, req, &self.limits, deadline);
        if result.truncated {
            debug!(name = %req.name, paths = result.paths.len(), "path enumeration truncated");
        }
        Ok(result)
    }

    fn prepare(&self, req: &TraversalRequest) -> GraphResult<(Arc<Graph>, Option<Instant>)> {
        let started = Instant::now();
        req.validate()?;
        let deadline = req.timeout().and_then(|t| started.checked_add(t));
        Ok((self.store.snapshot()?, deadline))
    }
}
