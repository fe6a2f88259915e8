//! Entity resolution: `(name, type)` → stable [`EntityId`].

use crate::entity::{Entity, EntityId, EntityKey};
use crate::storage::StorageError;

use super::Graph;

impl Graph {
    /// Returns the id of the entity with this exact `(name, type)` identity,
    /// creating it on first sight.
    ///
    /// Idempotent: any number of calls with the same pair, in any order
    /// relative to other resolutions, return the same id and never create a
    /// duplicate. An empty name resolves like any other; callers that want to
    /// avoid placeholder nodes skip the call.
    ///
    /// # Errors
    /// [`StorageError::CapacityExceeded`] if the entity id space is exhausted.
    pub fn resolve(&mut self, name: &str, entity_type: &str) -> Result<EntityId, StorageError> {
        let key = EntityKey::new(name, entity_type);
        if let Some(id) = self.by_key.get(&key) {
            return Ok(*id);
        }

        let index = u32::try_from(self.entities.len())
            .map_err(|_| StorageError::CapacityExceeded("entities"))?;
        let id = EntityId::from_index(index);

        self.entities.push(Entity {
            id,
            name: key.name.clone(),
            entity_type: key.entity_type.clone(),
        });
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        self.by_name.entry(key.name.clone()).or_default().push(id);
        self.by_key.insert(key, id);

        Ok(id)
    }
}
