//! Uncommitted changes layered over a published graph.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entity::{Entity, EntityId, EntityKey};
use crate::relationship::{EdgeId, EdgeKey, Relationship};
use crate::storage::StorageError;

use super::Graph;

/// A batch's view of the graph: a shared base snapshot plus the entities and
/// edges the batch has created or overwritten.
///
/// Staging never copies the base. Ids handed out here continue the base's
/// dense id sequence, so they match the ids the store assigns when it
/// replays the batch's mutations onto the same base version.
#[derive(Debug, Clone)]
pub struct StagedGraph {
    base: Arc<Graph>,
    entities: Vec<Entity>,
    by_key: HashMap<EntityKey, EntityId>,
    edges: Vec<Relationship>,
    edge_index: HashMap<EdgeKey, EdgeId>,
    /// Base edges overwritten by this batch.
    updated: HashMap<EdgeId, Relationship>,
}

impl StagedGraph {
    /// Starts an empty overlay on `base`.
    #[must_use]
    pub fn new(base: Arc<Graph>) -> Self {
        Self {
            base,
            entities: Vec::new(),
            by_key: HashMap::new(),
            edges: Vec::new(),
            edge_index: HashMap::new(),
            updated: HashMap::new(),
        }
    }

    /// The committed graph this overlay was started on.
    #[must_use]
    pub fn base(&self) -> &Graph {
        &self.base
    }

    /// Entities in the base plus entities created by this batch.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.base.entity_count() + self.entities.len()
    }

    /// Relationships in the base plus relationships created by this batch.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.base.relationship_count() + self.edges.len()
    }

    /// Returns the entity with the given id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        match id.index().checked_sub(self.base.entity_count()) {
            None => self.base.entity(id),
            Some(local) => self.entities.get(local),
        }
    }

    /// Returns the relationship with the given id, as staged.
    #[must_use]
    pub fn relationship(&self, id: EdgeId) -> Option<&Relationship> {
        match id.index().checked_sub(self.base.relationship_count()) {
            None => self.updated.get(&id).or_else(|| self.base.relationship(id)),
            Some(local) => self.edges.get(local),
        }
    }

    /// Looks up an entity by its exact `(name, type)` identity.
    #[must_use]
    pub fn find(&self, name: &str, entity_type: &str) -> Option<EntityId> {
        self.base
            .find(name, entity_type)
            .or_else(|| self.by_key.get(&EntityKey::new(name, entity_type)).copied())
    }

    /// Staged counterpart of [`Graph::resolve`].
    ///
    /// # Errors
    /// [`StorageError::CapacityExceeded`] if the entity id space is exhausted.
    pub fn resolve(&mut self, name: &str, entity_type: &str) -> Result<EntityId, StorageError> {
        let key = EntityKey::new(name, entity_type);
        if let Some(id) = self.base.by_key.get(&key).or_else(|| self.by_key.get(&key)) {
            return Ok(*id);
        }

        let index = u32::try_from(self.entity_count())
            .map_err(|_| StorageError::CapacityExceeded("entities"))?;
        let id = EntityId::from_index(index);
        self.entities.push(Entity {
            id,
            name: key.name.clone(),
            entity_type: key.entity_type.clone(),
        });
        self.by_key.insert(key, id);
        Ok(id)
    }

    /// Staged counterpart of [`Graph::merge`].
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

        let key = EdgeKey::new(self.base.policy(), head, tail, relation);
        let existing = self
            .base
            .edge_index
            .get(&key)
            .or_else(|| self.edge_index.get(&key))
            .copied();

        if let Some(id) = existing {
            let edge = self.staged_edge_mut(id)?;
            edge.relation = relation.to_string();
            edge.evidence = evidence.map(str::to_string);
            edge.record_id = record_id.map(str::to_string);
            return Ok(id);
        }

        let index = u32::try_from(self.relationship_count())
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
        self.edge_index.insert(key, id);
        Ok(id)
    }

    fn staged_edge_mut(&mut self, id: EdgeId) -> Result<&mut Relationship, StorageError> {
        let missing = || StorageError::Backend(format!("edge {id} is indexed but not stored"));
        match id.index().checked_sub(self.base.relationship_count()) {
            Some(local) => self.edges.get_mut(local).ok_or_else(missing),
            None => {
                if !self.updated.contains_key(&id) {
                    let original = self.base.relationship(id).cloned().ok_or_else(missing)?;
                    self.updated.insert(id, original);
                }
                self.updated.get_mut(&id).ok_or_else(missing)
            }
        }
    }
}
