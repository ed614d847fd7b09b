//! Transaction: a batch bound to a backend transaction id
//!
//! A `Transaction` is a `Batch` specialized with a backend-issued id and
//! read-consistency options. `begin()` asks the backend for the id before
//! any mutations are accepted; `commit()` passes the id through so the
//! backend can validate and commit atomically; `rollback()` sends an
//! explicit abort RPC.
//!
//! Nested transactions are legal on a client's context stack, but each
//! `Transaction` owns exactly one backend transaction id; nesting does not
//! join the outer backend transaction.

use crate::batch::{Batch, BatchStatus, CommitSummary};
use crate::connection::{Connection, TransactionId, TransactionOptions};
use lodestore_core::{Entity, Error, Key, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

struct TxnShared {
    options: TransactionOptions,
    id: Mutex<Option<TransactionId>>,
}

/// A cloneable handle to one transaction
#[derive(Clone)]
pub struct Transaction {
    batch: Batch,
    shared: Arc<TxnShared>,
}

impl Transaction {
    pub(crate) fn new(
        project: String,
        namespace: Option<String>,
        connection: Arc<dyn Connection>,
        options: TransactionOptions,
    ) -> Self {
        Self {
            batch: Batch::new(project, namespace, connection),
            shared: Arc::new(TxnShared {
                options,
                id: Mutex::new(None),
            }),
        }
    }

    /// The underlying mutation batch
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Read-consistency options this transaction was created with
    pub fn options(&self) -> &TransactionOptions {
        &self.shared.options
    }

    /// The backend-issued id, absent until `begin()` succeeds and cleared
    /// again after commit/rollback
    pub fn id(&self) -> Option<TransactionId> {
        self.shared.id.lock().clone()
    }

    /// Current lifecycle status (delegates to the batch)
    pub fn status(&self) -> BatchStatus {
        self.batch.status()
    }

    /// Number of pending mutations
    pub fn mutation_count(&self) -> usize {
        self.batch.mutation_count()
    }

    /// Record a put mutation
    pub fn put(&self, entity: &Entity) -> Result<()> {
        self.batch.put(entity)
    }

    /// Record a delete mutation
    pub fn delete(&self, key: &Key) -> Result<()> {
        self.batch.delete(key)
    }

    pub(crate) fn same_handle(&self, other: &Transaction) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Begin the transaction: start the batch, then request an id from the
    /// backend
    ///
    /// # Errors
    ///
    /// `BadRequest` on double-begin. A failed `begin_transaction` RPC marks
    /// the transaction `Aborted` and surfaces the error unchanged.
    pub fn begin(&self) -> Result<()> {
        self.batch.begin()?;
        match self
            .batch
            .connection()
            .begin_transaction(self.batch.project(), &self.shared.options)
        {
            Ok(id) => {
                debug!(project = %self.batch.project(), id = %id, "transaction begun");
                *self.shared.id.lock() = Some(id);
                Ok(())
            }
            Err(err) => {
                self.batch.force_abort();
                Err(err)
            }
        }
    }

    /// Commit the batch under this transaction's id
    ///
    /// The id is cleared after a successful commit.
    ///
    /// # Errors
    ///
    /// `BadRequest` when the transaction never begun; commit RPC failures
    /// leave the batch `InProgress` (and the id in place) for retry.
    pub fn commit(&self) -> Result<CommitSummary> {
        let id = self
            .id()
            .ok_or_else(|| Error::bad_request("transaction must be begun to commit()"))?;
        let summary = self.batch.commit_with(Some(&id))?;
        *self.shared.id.lock() = None;
        Ok(summary)
    }

    /// Send an explicit abort RPC and mark the transaction aborted
    ///
    /// The transaction ends `Aborted` with its id cleared even when the
    /// rollback RPC itself fails; the RPC error is still surfaced.
    pub fn rollback(&self) -> Result<()> {
        let id = self
            .id()
            .ok_or_else(|| Error::bad_request("transaction must be begun to rollback()"))?;
        let result = self
            .batch
            .connection()
            .rollback(self.batch.project(), &id);
        self.batch.force_abort();
        *self.shared.id.lock() = None;
        result
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("batch", &self.batch)
            .field("id", &self.shared.id.lock())
            .field("read_only", &self.shared.options.read_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallRecord, MockConnection};
    use lodestore_core::Key;

    fn setup() -> (Arc<MockConnection>, Transaction) {
        let connection = Arc::new(MockConnection::new());
        let txn = Transaction::new(
            "project".to_string(),
            None,
            connection.clone(),
            TransactionOptions::default(),
        );
        (connection, txn)
    }

    fn entity() -> Entity {
        let key = Key::with_id("project", None, "Kind", 1).unwrap();
        Entity::with_key(key)
    }

    #[test]
    fn test_begin_requests_id() {
        let (connection, txn) = setup();
        assert!(txn.id().is_none());

        txn.begin().unwrap();
        assert!(txn.id().is_some());
        assert_eq!(txn.status(), BatchStatus::InProgress);
        assert!(matches!(
            connection.calls()[0],
            CallRecord::BeginTransaction { .. }
        ));
    }

    #[test]
    fn test_begin_rpc_failure_aborts() {
        let (connection, txn) = setup();
        connection.fail_next_begin("backend unavailable");

        let result = txn.begin();
        assert!(matches!(result, Err(Error::Rpc(_))));
        assert_eq!(txn.status(), BatchStatus::Aborted);
        assert!(txn.id().is_none());
    }

    #[test]
    fn test_commit_passes_id_through() {
        let (connection, txn) = setup();
        txn.begin().unwrap();
        let id = txn.id().unwrap();
        txn.put(&entity()).unwrap();
        txn.commit().unwrap();

        let commits: Vec<_> = connection
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                CallRecord::Commit { transaction, .. } => Some(transaction),
                _ => None,
            })
            .collect();
        assert_eq!(commits, vec![Some(id)]);
        // Id is cleared after commit
        assert!(txn.id().is_none());
        assert_eq!(txn.status(), BatchStatus::Finished);
    }

    #[test]
    fn test_commit_before_begin_rejected() {
        let (_connection, txn) = setup();
        let result = txn.commit();
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_failed_commit_keeps_id_for_retry() {
        let (connection, txn) = setup();
        txn.begin().unwrap();
        txn.put(&entity()).unwrap();
        connection.fail_next_commit("backend unavailable");

        assert!(txn.commit().is_err());
        assert_eq!(txn.status(), BatchStatus::InProgress);
        assert!(txn.id().is_some());

        txn.commit().unwrap();
        assert_eq!(txn.status(), BatchStatus::Finished);
    }

    #[test]
    fn test_rollback_sends_abort_rpc() {
        let (connection, txn) = setup();
        txn.begin().unwrap();
        let id = txn.id().unwrap();
        txn.rollback().unwrap();

        assert_eq!(txn.status(), BatchStatus::Aborted);
        assert!(txn.id().is_none());
        assert!(connection
            .calls()
            .iter()
            .any(|call| matches!(call, CallRecord::Rollback { transaction, .. } if *transaction == id)));
    }

    #[test]
    fn test_rollback_rpc_failure_still_aborts() {
        let (connection, txn) = setup();
        txn.begin().unwrap();
        connection.fail_next_rollback("backend unavailable");

        let result = txn.rollback();
        assert!(matches!(result, Err(Error::Rpc(_))));
        assert_eq!(txn.status(), BatchStatus::Aborted);
        assert!(txn.id().is_none());
    }

    #[test]
    fn test_rollback_before_begin_rejected() {
        let (_connection, txn) = setup();
        let result = txn.rollback();
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_read_only_options_reach_backend() {
        let connection = Arc::new(MockConnection::new());
        let txn = Transaction::new(
            "project".to_string(),
            None,
            connection.clone(),
            TransactionOptions::read_only(),
        );
        txn.begin().unwrap();
        assert!(matches!(
            connection.calls()[0],
            CallRecord::BeginTransaction { read_only: true, .. }
        ));
    }

    #[test]
    fn test_each_transaction_owns_its_own_id() {
        let connection: Arc<MockConnection> = Arc::new(MockConnection::new());
        let outer = Transaction::new(
            "project".to_string(),
            None,
            connection.clone(),
            TransactionOptions::default(),
        );
        let inner = Transaction::new(
            "project".to_string(),
            None,
            connection,
            TransactionOptions::default(),
        );
        outer.begin().unwrap();
        inner.begin().unwrap();
        assert_ne!(outer.id(), inner.id());
    }
}
