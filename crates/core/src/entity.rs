//! Entities: a key plus a typed property map
//!
//! An `Entity` maps property names to `Value`s and optionally owns a `Key`.
//! A key is required for persistence but may be absent while the entity is
//! being assembled. Two metadata channels ride along with the properties:
//!
//! - `excluded_from_indexes`: property names the backend should not index
//! - `meanings`: opaque per-property annotations passed through to the
//!   backend unchanged (never interpreted here)
//!
//! Property insertion order is irrelevant; equality compares key, properties
//! and index exclusions. Meanings are metadata and do not participate in
//! equality, matching the behavior entities had in the system this client
//! talks to.

use crate::key::Key;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A key plus a property map plus indexing/meaning metadata
///
/// # Examples
///
/// ```
/// use lodestore_core::{Entity, Key, Value};
///
/// let key = Key::with_name("project", None, "Person", "alice").unwrap();
/// let mut entity = Entity::with_key(key);
/// entity.set("name", "Alice");
/// entity.set("age", 34i64);
///
/// assert_eq!(entity.get("name"), Some(&Value::String("Alice".into())));
/// assert_eq!(entity.len(), 2);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entity {
    key: Option<Key>,
    properties: HashMap<String, Value>,
    excluded_from_indexes: HashSet<String>,
    meanings: HashMap<String, i64>,
}

impl Entity {
    /// Create an entity with no key yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity owned by `key`
    pub fn with_key(key: Key) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    /// The owning key, if assigned
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Assign or replace the owning key
    pub fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    /// Remove and return the owning key
    pub fn take_key(&mut self) -> Option<Key> {
        self.key.take()
    }

    // ========== Mapping contract ==========

    /// Get a property value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Set a property value, returning the previous value if any
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(name.into(), value.into())
    }

    /// Remove a property, returning its value if it existed
    ///
    /// The property's index exclusion and meaning annotations are dropped
    /// with it.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.excluded_from_indexes.remove(name);
        self.meanings.remove(name);
        self.properties.remove(name)
    }

    /// Whether a property exists
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the entity has no properties
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Iterate over properties (order unspecified)
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    // ========== Index exclusion metadata ==========

    /// Mark a property as excluded from backend indexes
    pub fn exclude_from_indexes(&mut self, name: impl Into<String>) {
        self.excluded_from_indexes.insert(name.into());
    }

    /// Whether a property is excluded from indexes
    pub fn is_excluded_from_indexes(&self, name: &str) -> bool {
        self.excluded_from_indexes.contains(name)
    }

    /// The set of excluded property names
    pub fn excluded_from_indexes_set(&self) -> &HashSet<String> {
        &self.excluded_from_indexes
    }

    // ========== Meaning metadata ==========

    /// Attach an opaque meaning annotation to a property
    pub fn set_meaning(&mut self, name: impl Into<String>, meaning: i64) {
        self.meanings.insert(name.into(), meaning);
    }

    /// Get the meaning annotation for a property, if any
    pub fn meaning(&self, name: &str) -> Option<i64> {
        self.meanings.get(name).copied()
    }

    /// All meaning annotations
    pub fn meanings(&self) -> &HashMap<String, i64> {
        &self.meanings
    }
}

// Meanings are pass-through metadata and do not affect equality.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.properties == other.properties
            && self.excluded_from_indexes == other.excluded_from_indexes
    }
}
