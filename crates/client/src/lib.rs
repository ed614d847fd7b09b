//! Client layer for the lodestore datastore
//!
//! This crate turns the core data model (`lodestore-core`) into a working
//! access layer against a remote backend:
//!
//! - `Client`: the application-facing entry point, scoped to one project
//!   and optional namespace
//! - `Batch` / `Transaction`: mutation accumulators committed in a single
//!   request, with and without backend transaction semantics
//! - `Context` / `ContextStack`: per-client LIFO routing of implicit
//!   mutations into the innermost active batch or transaction
//! - `Connection`: the transport trait; `testing::MockConnection` provides
//!   a scripted in-memory implementation
//! - `ClientConfig`: project/namespace/retry settings, loadable from
//!   `lodestore.toml`
//!
//! ## Concurrency
//!
//! All handles are cheap to clone and internally synchronized, but a
//! `Client` represents one logical unit of work: its context stack routes
//! implicit mutations, so sharing an instance across concurrent units of
//! work interleaves their routing. Create one client per unit of work.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod client;
pub mod config;
pub mod connection;
mod lookup;
pub mod stack;
pub mod testing;
pub mod transaction;

pub use batch::{Batch, BatchStatus, CommitSummary, Mutation};
pub use client::Client;
pub use config::{ClientConfig, CONFIG_FILE_NAME, DEFAULT_MAX_LOOKUP_ATTEMPTS};
pub use connection::{
    CommitResults, Connection, EntityData, LookupResults, PropertyData, TransactionId,
    TransactionOptions,
};
pub use stack::{Context, ContextStack};
pub use transaction::Transaction;

// The data model is re-exported so most applications need only this crate.
pub use lodestore_core::{Entity, Error, Key, PathElement, PathId, Result, Value};
