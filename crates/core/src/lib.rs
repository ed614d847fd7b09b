//! Core types for the lodestore datastore client
//!
//! This crate defines the foundational data model used throughout the system:
//! - Key: hierarchical entity identity (project, namespace, kind/id path)
//! - PathElement / PathId: the building blocks of key paths
//! - Value: the fixed set of supported property types
//! - Entity: a key plus a typed property map plus indexing/meaning metadata
//! - Error: error type hierarchy
//!
//! Nothing in this crate performs RPCs; the client layer lives in
//! `lodestore-client`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod error;
pub mod key;
pub mod value;

// Re-export commonly used types at the crate root
pub use entity::Entity;
pub use error::{Error, Result};
pub use key::{Key, PathElement, PathId};
pub use value::Value;
