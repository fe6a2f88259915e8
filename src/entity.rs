//! Entity types and identity management.
//!
//! An entity is identified by its exact `(name, type)` pair. The graph stores
//! entities in an arena, so an [`EntityId`] is a dense index that stays stable
//! for the life of the store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense, stable entity identifier (index into the entity arena).
///
/// # Examples
///
/// ```
/// use kgraph::EntityId;
///
/// let id = EntityId::from_index(3);
/// assert_eq!(id.index(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates an entity ID from a raw arena index.
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

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// The identity of an entity: an exact `(name, type)` pair.
///
/// No case folding or other normalization happens here; the record normalizer
/// only trims surrounding whitespace before keys are built.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Entity name, compared exactly.
    pub name: String,
    /// Type tag; may be empty.
    pub entity_type: String,
}

impl EntityKey {
    /// Creates a key from a name and a type tag.
    #[must_use]
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entity_type.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.entity_type, self.name)
        }
    }
}

/// A type-tagged node in the graph.
///
/// Entities are created on first resolution and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Arena id.
    pub id: EntityId,
    /// Entity name.
    pub name: String,
    /// Type tag; may be empty.
    pub entity_type: String,
}

impl Entity {
    /// Returns the identity key of this entity.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.name.clone(), self.entity_type.clone())
    }

    /// Returns true if this entity has the given `(name, type)` identity.
    #[must_use]
    pub fn matches(&self, name: &str, entity_type: &str) -> bool {
        self.name == name && self.entity_type == entity_type
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entity_type.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.entity_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_display_and_order() {
        let a = EntityId::from_index(1);
        let b = EntityId::from_index(2);
        assert!(a < b);
        assert_eq!(a.to_string(), "e1");
        assert_eq!(b.index(), 2);
    }

    #[test]
    fn test_entity_id_serde_is_transparent() {
        let json = serde_json::to_string(&EntityId::from_index(7)).unwrap();
        assert_eq!(json, "7");
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EntityId::from_index(7));
    }

    #[test]
    fn test_keys_differ_by_type() {
        let component = EntityKey::new("wing", "Component");
        let concept = EntityKey::new("wing", "Concept");
        assert_ne!(component, concept);
        assert_eq!(component.to_string(), "Component:wing");
        assert_eq!(EntityKey::new("wing", "").to_string(), "wing");
    }

    #[test]
    fn test_entity_key_roundtrip_through_entity() {
        let entity = Entity {
            id: EntityId::from_index(0),
            name: "aircraft".to_string(),
            entity_type: "System".to_string(),
        };
        assert_eq!(entity.key(), EntityKey::new("aircraft", "System"));
        assert!(entity.matches("aircraft", "System"));
        assert!(!entity.matches("aircraft", "Vehicle"));
        assert_eq!(entity.to_string(), "aircraft (System)");
    }
}
