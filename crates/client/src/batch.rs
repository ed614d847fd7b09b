//! Batch: an accumulator of mutations committed in one request
//!
//! A `Batch` collects put/delete mutations and sends them to the backend in
//! a single `commit` RPC. The mutation verb is decided at the moment the
//! call is issued: an entity whose key is still partial becomes an `insert`
//! (a new identity assigned by this write), a complete key becomes an
//! `upsert` (overwrite, no existence check). Deletes always carry just the
//! key.
//!
//! ## Lifecycle
//!
//! `NotStarted → InProgress → {Finished | Aborted}`. A finished or aborted
//! batch accepts no further mutations. A failed commit leaves the batch
//! `InProgress` so the caller may retry without rebuilding mutations.
//!
//! ## Scoped use
//!
//! A batch is meant to be used as a scoped resource: `begin()` on entry,
//! `commit()` on normal exit, `rollback()` on error exit, with the owning
//! client's context stack popped on every path. `Client::in_batch` wraps
//! this contract; manual use goes through `Client::push_context` /
//! `Client::pop_context`.

use crate::connection::{CommitResults, Connection, EntityData, TransactionId};
use lodestore_core::{Entity, Error, Key, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Batch lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Created but `begin()` has not been called
    NotStarted,
    /// Accepting mutations
    InProgress,
    /// Rolled back; accepts nothing further
    Aborted,
    /// Committed; accepts nothing further
    Finished,
}

/// One pending mutation, tagged with its wire verb
///
/// The verb is fixed when the mutation is recorded, from the key's
/// partial/complete state at that moment. `Update` is part of the wire
/// vocabulary but nothing in this client emits it today.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// New entity; the backend assigns the terminal id
    Insert(EntityData),
    /// Overwrite semantics, no existence check
    Upsert(EntityData),
    /// Overwrite an entity that must already exist
    Update(EntityData),
    /// Remove by key
    Delete(Key),
}

impl Mutation {
    /// Wire verb name
    pub fn verb(&self) -> &'static str {
        match self {
            Mutation::Insert(_) => "insert",
            Mutation::Upsert(_) => "upsert",
            Mutation::Update(_) => "update",
            Mutation::Delete(_) => "delete",
        }
    }

    /// The key this mutation targets
    pub fn key(&self) -> &Key {
        match self {
            Mutation::Insert(data) | Mutation::Upsert(data) | Mutation::Update(data) => &data.key,
            Mutation::Delete(key) => key,
        }
    }

    /// Whether this is an insert on a partial key (the mutations the commit
    /// response returns completed keys for, positionally)
    pub fn completes_key(&self) -> bool {
        matches!(self, Mutation::Insert(data) if data.key.is_partial())
    }
}

/// Outcome of a successful commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitSummary {
    /// Backend-reported index update count
    pub index_updates: u64,
    /// Completed keys, in the order their insert mutations were submitted
    pub completed_keys: Vec<Key>,
}

struct BatchState {
    status: BatchStatus,
    mutations: Vec<Mutation>,
}

struct BatchShared {
    project: String,
    namespace: Option<String>,
    connection: Arc<dyn Connection>,
    state: Mutex<BatchState>,
}

/// A cloneable handle to one mutation batch
///
/// Clones share state; the client's context stack and the caller hold the
/// same underlying batch.
#[derive(Clone)]
pub struct Batch {
    shared: Arc<BatchShared>,
}

impl Batch {
    pub(crate) fn new(
        project: String,
        namespace: Option<String>,
        connection: Arc<dyn Connection>,
    ) -> Self {
        Self {
            shared: Arc::new(BatchShared {
                project,
                namespace,
                connection,
                state: Mutex::new(BatchState {
                    status: BatchStatus::NotStarted,
                    mutations: Vec::new(),
                }),
            }),
        }
    }

    /// Project this batch commits against
    pub fn project(&self) -> &str {
        &self.shared.project
    }

    /// Namespace inherited from the owning client
    pub fn namespace(&self) -> Option<&str> {
        self.shared.namespace.as_deref()
    }

    /// Current lifecycle status
    pub fn status(&self) -> BatchStatus {
        self.shared.state.lock().status
    }

    /// Number of pending mutations
    pub fn mutation_count(&self) -> usize {
        self.shared.state.lock().mutations.len()
    }

    pub(crate) fn connection(&self) -> &Arc<dyn Connection> {
        &self.shared.connection
    }

    pub(crate) fn same_handle(&self, other: &Batch) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Start accepting mutations
    ///
    /// # Errors
    ///
    /// `BadRequest` unless the batch is `NotStarted`.
    pub fn begin(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.status != BatchStatus::NotStarted {
            return Err(Error::bad_request("batch already started"));
        }
        state.status = BatchStatus::InProgress;
        Ok(())
    }

    /// Record a put mutation
    ///
    /// The verb is chosen here: `insert` when the entity's key is partial,
    /// `upsert` when it is complete.
    ///
    /// # Errors
    ///
    /// `BadRequest` when the batch is not in progress, the entity has no
    /// key, or the key belongs to a different project.
    pub fn put(&self, entity: &Entity) -> Result<()> {
        let data = EntityData::from_entity(entity)?;
        if data.key.project() != self.shared.project {
            return Err(Error::bad_request(
                "key must be from the same project as the batch",
            ));
        }
        let mutation = if data.key.is_partial() {
            Mutation::Insert(data)
        } else {
            Mutation::Upsert(data)
        };

        let mut state = self.shared.state.lock();
        if state.status != BatchStatus::InProgress {
            return Err(Error::bad_request("batch must be in progress to put()"));
        }
        state.mutations.push(mutation);
        Ok(())
    }

    /// Record a delete mutation
    ///
    /// # Errors
    ///
    /// `BadRequest` when the batch is not in progress, the key is partial,
    /// or the key belongs to a different project.
    pub fn delete(&self, key: &Key) -> Result<()> {
        if key.is_partial() {
            return Err(Error::bad_request("key must be complete to delete"));
        }
        if key.project() != self.shared.project {
            return Err(Error::bad_request(
                "key must be from the same project as the batch",
            ));
        }
        let mut state = self.shared.state.lock();
        if state.status != BatchStatus::InProgress {
            return Err(Error::bad_request("batch must be in progress to delete()"));
        }
        state.mutations.push(Mutation::Delete(key.clone()));
        Ok(())
    }

    /// Send the accumulated mutations in one commit request
    ///
    /// On success the batch transitions to `Finished` and the summary carries
    /// the completed keys for insert-on-partial mutations, positionally. On
    /// failure the batch stays `InProgress` and the error is surfaced
    /// unchanged; the caller may retry the commit.
    pub fn commit(&self) -> Result<CommitSummary> {
        self.commit_with(None)
    }

    pub(crate) fn commit_with(&self, transaction: Option<&TransactionId>) -> Result<CommitSummary> {
        let mutations = {
            let state = self.shared.state.lock();
            if state.status != BatchStatus::InProgress {
                return Err(Error::bad_request("batch must be in progress to commit()"));
            }
            state.mutations.clone()
        };
        debug!(
            project = %self.shared.project,
            mutations = mutations.len(),
            in_transaction = transaction.is_some(),
            "committing batch"
        );
        // The lock is not held across the RPC; a failed commit leaves the
        // batch in progress for retry.
        let CommitResults {
            index_updates,
            completed_keys,
        } = self
            .shared
            .connection
            .commit(&self.shared.project, &mutations, transaction)?;

        self.shared.state.lock().status = BatchStatus::Finished;
        Ok(CommitSummary {
            index_updates,
            completed_keys,
        })
    }

    /// Discard pending mutations and mark the batch aborted
    ///
    /// Local only; no RPC is issued for a plain batch.
    ///
    /// # Errors
    ///
    /// `BadRequest` unless the batch is `InProgress`.
    pub fn rollback(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.status != BatchStatus::InProgress {
            return Err(Error::bad_request("batch must be in progress to rollback()"));
        }
        state.status = BatchStatus::Aborted;
        state.mutations.clear();
        Ok(())
    }

    // Unconditional abort, used when a transaction fails to begin.
    pub(crate) fn force_abort(&self) {
        let mut state = self.shared.state.lock();
        state.status = BatchStatus::Aborted;
        state.mutations.clear();
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Batch")
            .field("project", &self.shared.project)
            .field("status", &state.status)
            .field("mutations", &state.mutations.len())
            .finish()
    }
}
