//! Lodestore - client access layer for a remote schemaless entity datastore
//!
//! Lodestore stores entities: property maps identified by hierarchical keys
//! scoped to a project and optional namespace. This crate is the client
//! side: key/entity modeling, batched mutations, transactions, and a
//! multi-key lookup engine over a pluggable `Connection` transport.
//!
//! # Quick Start
//!
//! ```ignore
//! use lodestore::{Client, ClientConfig, Entity};
//!
//! let client = Client::new(ClientConfig::new("my-project"), connection);
//!
//! // Save an entity; the backend completes the partial key in place
//! let mut entity = Entity::with_key(client.key("Task")?);
//! entity.set("done", false);
//! client.put(&mut entity)?;
//!
//! // Fetch it back
//! let fetched = client.get(entity.key().unwrap(), None, None, None)?;
//! ```
//!
//! # Architecture
//!
//! The data model (keys, values, entities, errors) lives in
//! `lodestore-core`; everything RPC-shaped lives in `lodestore-client`.
//! Both are re-exported here, so applications depend only on this crate.

// Re-export the public API from lodestore-client (which itself re-exports
// the lodestore-core data model).
pub use lodestore_client::*;
