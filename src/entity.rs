//! Entity types and the per-run entity registry.
//!
//! Entities are the biological actors facts talk about: genes, proteins,
//! complexes, pathway nodes. They are registered once when a scenario is
//! loaded and never change or disappear during a run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Stable entity identifier.
///
/// Identifiers are plain names ("LRP6", "BETA_CAT") so that two runs over the
/// same scenario produce byte-identical output.
///
/// # Examples
///
/// ```
/// use bioreasoner::EntityId;
///
/// let id = EntityId::new("LRP6");
/// assert_eq!(id.as_str(), "LRP6");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an entity ID from a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Classification of biological entities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A gene or genetic locus
    Gene,
    /// A protein or protein isoform
    Protein,
    /// A multi-protein complex (e.g. the destruction complex)
    Complex,
    /// A secreted ligand or growth factor
    Ligand,
    /// A node in a signaling pathway
    Pathway,
    /// A cellular process (apoptosis, proliferation)
    Process,
    /// A custom entity kind
    Custom(String),
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gene => write!(f, "gene"),
            Self::Protein => write!(f, "protein"),
            Self::Complex => write!(f, "complex"),
            Self::Ligand => write!(f, "ligand"),
            Self::Pathway => write!(f, "pathway"),
            Self::Process => write!(f, "process"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// A registered biological actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,

    /// Optional type tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntityKind>,

    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity {
    /// Creates an untyped entity.
    #[must_use]
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            description: None,
        }
    }

    /// Creates an entity with a type tag.
    #[must_use]
    pub fn typed(id: impl Into<EntityId>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind: Some(kind),
            description: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The set of entities registered for one run.
///
/// Iteration order is the identifier order, never insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRegistry {
    by_id: BTreeMap<EntityId, Entity>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a list of entities, rejecting duplicates.
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Result<Self, ValidationError> {
        let mut registry = Self::new();
        for entity in entities {
            registry.register(entity)?;
        }
        Ok(registry)
    }

    /// Registers an entity. Returns an error if the ID is already taken.
    pub fn register(&mut self, entity: Entity) -> Result<(), ValidationError> {
        crate::ruleset::validation::validate_entity_name(entity.id.as_str())?;
        if self.by_id.contains_key(&entity.id) {
            return Err(ValidationError::DuplicateEntity { entity: entity.id });
        }
        self.by_id.insert(entity.id.clone(), entity);
        Ok(())
    }

    /// Returns true if the entity is registered.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Looks up an entity.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.by_id.get(id)
    }

    /// Fails with [`ValidationError::UnknownEntity`] if `id` is not registered.
    pub fn require(&self, id: &EntityId, context: impl FnOnce() -> String) -> Result<(), ValidationError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(ValidationError::UnknownEntity {
                entity: id.clone(),
                context: context(),
            })
        }
    }

    /// Number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if no entity is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterates entities in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_display() {
        let id = EntityId::new("AKT");
        assert_eq!(format!("{id}"), "AKT");
    }

    #[test]
    fn entity_kind_display() {
        assert_eq!(format!("{}", EntityKind::Protein), "protein");
        assert_eq!(
            format!("{}", EntityKind::Custom("receptor".to_string())),
            "custom:receptor"
        );
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = EntityRegistry::new();
        registry.register(Entity::new("LRP6")).unwrap();
        let err = registry.register(Entity::typed("LRP6", EntityKind::Protein)).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateEntity { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_rejects_invalid_names() {
        let mut registry = EntityRegistry::new();
        assert!(registry.register(Entity::new("")).is_err());
        assert!(registry.register(Entity::new("has space")).is_err());
    }

    #[test]
    fn registry_iterates_in_id_order() {
        let registry = EntityRegistry::from_entities([
            Entity::new("WNT"),
            Entity::new("AKT"),
            Entity::new("LRP6"),
        ])
        .unwrap();
        let names: Vec<_> = registry.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(names, vec!["AKT", "LRP6", "WNT"]);
    }

    #[test]
    fn require_reports_context() {
        let registry = EntityRegistry::new();
        let err = registry
            .require(&EntityId::new("GSK3"), || "fact #0".to_string())
            .unwrap_err();
        assert!(format!("{err}").contains("fact #0"));
    }

    #[test]
    fn entity_serialization() {
        let entity = Entity::typed("LRP6", EntityKind::Protein).with_description("co-receptor");
        let json = serde_json::to_string(&entity).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(entity, back);
    }
}
