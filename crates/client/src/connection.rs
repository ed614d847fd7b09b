//! Connection contract to the backend datastore
//!
//! The backend exposes exactly five primitives: lookup-by-keys, commit a
//! mutation batch, allocate ids, begin a transaction, and roll one back.
//! This module defines the trait the transport layer implements and the
//! wire-shaped request/response structs the client builds and consumes.
//! Whatever encoding the transport uses on the wire is opaque here.
//!
//! ## Contract
//!
//! - `lookup` partitions the requested keys into found/missing/deferred;
//!   deferred keys are a normal backend signal, not an error
//! - `commit` returns completed keys, in submission order, for exactly the
//!   insert mutations that targeted partial keys
//! - `allocate_ids` is order-preserving
//! - errors are surfaced to the caller unchanged; nothing here retries

use crate::batch::Mutation;
use lodestore_core::{Entity, Error, Key, Result, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque backend-issued transaction identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(Vec<u8>);

impl TransactionId {
    /// Wrap raw transaction id bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw id bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Read-consistency options for a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOptions {
    /// Read-only transactions allow no mutations on the backend side;
    /// the default is read-write.
    pub read_only: bool,
}

impl TransactionOptions {
    /// Options for a read-only transaction
    pub fn read_only() -> Self {
        Self { read_only: true }
    }
}

/// One property in wire form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyData {
    /// Property name
    pub name: String,
    /// Property value
    pub value: Value,
    /// Whether the backend should skip indexing this property
    pub exclude_from_indexes: bool,
    /// Opaque meaning annotation, passed through unchanged
    pub meaning: Option<i64>,
}

/// An entity in wire form: a key plus a flat property list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityData {
    /// The entity's key (always present on the wire)
    pub key: Key,
    /// Flat property list
    pub properties: Vec<PropertyData>,
}

impl EntityData {
    /// Build wire form from an application entity
    ///
    /// # Errors
    ///
    /// `BadRequest` when the entity has no key.
    pub fn from_entity(entity: &Entity) -> Result<Self> {
        let key = entity
            .key()
            .cloned()
            .ok_or_else(|| Error::bad_request("entity is missing a key"))?;
        let properties = entity
            .properties()
            .map(|(name, value)| PropertyData {
                name: name.to_string(),
                value: value.clone(),
                exclude_from_indexes: entity.is_excluded_from_indexes(name),
                meaning: entity.meaning(name),
            })
            .collect();
        Ok(Self { key, properties })
    }

    /// Decode wire form into an application entity
    ///
    /// Property values, index exclusions and meaning annotations are all
    /// carried over.
    pub fn into_entity(self) -> Entity {
        let mut entity = Entity::with_key(self.key);
        for property in self.properties {
            if property.exclude_from_indexes {
                entity.exclude_from_indexes(property.name.clone());
            }
            if let Some(meaning) = property.meaning {
                entity.set_meaning(property.name.clone(), meaning);
            }
            entity.set(property.name, property.value);
        }
        entity
    }
}

/// Result of one `lookup` call
///
/// The three lists partition the requested keys: each requested key shows up
/// as a found entity, a missing key, or a deferred key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupResults {
    /// Entities the backend resolved, in backend-returned order
    pub found: Vec<EntityData>,
    /// Keys with no stored entity
    pub missing: Vec<Key>,
    /// Keys the backend could not resolve in this pass; retry them
    pub deferred: Vec<Key>,
}

/// Result of one `commit` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitResults {
    /// Backend-reported index update count
    pub index_updates: u64,
    /// Completed keys for the insert mutations that targeted partial keys,
    /// in the order those mutations were submitted
    pub completed_keys: Vec<Key>,
}

/// The backend primitives this client drives
///
/// Implemented by the excluded transport layer; consumed here. All calls are
/// synchronous. Implementations surface failures as `Error::Rpc` (or `Io`)
/// and never retry on their own.
pub trait Connection: Send + Sync {
    /// Look up entities by key
    fn lookup(
        &self,
        project: &str,
        keys: &[Key],
        eventual: bool,
        transaction: Option<&TransactionId>,
    ) -> Result<LookupResults>;

    /// Commit a mutation batch, optionally under a transaction
    fn commit(
        &self,
        project: &str,
        mutations: &[Mutation],
        transaction: Option<&TransactionId>,
    ) -> Result<CommitResults>;

    /// Allocate backend-assigned ids for partial keys (order-preserving)
    fn allocate_ids(&self, project: &str, incomplete_keys: &[Key]) -> Result<Vec<Key>>;

    /// Begin a backend transaction and return its id
    fn begin_transaction(
        &self,
        project: &str,
        options: &TransactionOptions,
    ) -> Result<TransactionId>;

    /// Abort a backend transaction
    fn rollback(&self, project: &str, transaction: &TransactionId) -> Result<()>;
}
