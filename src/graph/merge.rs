//! Relationship merging: idempotent upsert of one directed edge.

use tracing::debug;

use crate::entity::EntityId;
use crate::relationship::{EdgeId, EdgeKey, Relationship};
use crate::storage::StorageError;

use super::Graph;

impl Graph {
    /// Creates or updates the edge from `head` to `tail`.
    ///
    /// The edge is looked up by its merge key (see
    /// [`crate::relationship::MergePolicy`]). When it exists, its relation,
    /// evidence and record id are overwritten with the new values and its id
    /// is returned unchanged; otherwise a new edge is created and indexed on
    /// both endpoints.
    ///
    /// # Errors
    /// - [`StorageError::EntityNotFound`] if either endpoint is unknown
    /// - [`StorageError::CapacityExceeded`] if the edge id space is exhausted
    pub fn merge(
        &mut self,
        head: EntityId,
        tail: EntityId,
        relation: &str,
        evidence: Option<&str>,
        record_id: Option<&str>,
    ) -> Result<EdgeId, StorageError> {
        for id in [head, tail] {
            if self.entity(id).is_none() {
                return Err(StorageError::EntityNotFound(id));
            }
        }

        let key = EdgeKey::new(self.policy, head, tail, relation);
        if let Some(&id) = self.edge_index.get(&key) {
            let edge = &mut self.edges[id.index()];
            if edge.relation != relation {
                debug!(
                    edge = %id,
                    head = %head,
                    tail = %tail,
                    previous = %edge.relation,
                    relation,
                    "relation label overwritten"
                );
                edge.relation = relation.to_string();
            }
            edge.evidence = evidence.map(str::to_string);
            edge.record_id = record_id.map(str::to_string);
            return Ok(id);
        }

        let index = u32::try_from(self.edges.len())
            .map_err(|_| StorageError::CapacityExceeded("relationships"))?;
        let id = EdgeId::from_index(index);

        self.edges.push(Relationship {
            id,
            head,
            tail,
            relation: relation.to_string(),
            evidence: evidence.map(str::to_string),
            record_id: record_id.map(str::to_string),
        });
        self.outgoing[head.index()].push(id);
        self.incoming[tail.index()].push(id);
        self.edge_index.insert(key, id);

        Ok(id)
    }
}
