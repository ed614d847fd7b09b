//! Client: the application-facing entry point
//!
//! A `Client` owns a project/namespace scope, a `Connection`, and a context
//! stack of active batches/transactions. Application-level "get/put/delete
//! many entities" calls are turned into the minimal sequence of backend
//! primitives:
//!
//! - reads go through the lookup engine and its bounded deferred-key loop
//! - writes route into the innermost active batch/transaction, or into a
//!   transient one-shot batch that is committed synchronously
//! - partial keys are completed from commit responses, matched by position
//!
//! One client per logical unit of work: the context stack is per-instance
//! state, and sharing an instance across concurrent units of work will
//! interleave their implicit mutation routing even though the stack itself
//! is lock-protected.

use crate::batch::Batch;
use crate::config::ClientConfig;
use crate::connection::{Connection, EntityData, TransactionOptions};
use crate::lookup::extended_lookup;
use crate::stack::{Context, ContextStack};
use crate::transaction::Transaction;
use lodestore_core::{Entity, Error, Key, Result};
use std::sync::Arc;
use tracing::{debug, trace};

/// Client for a remote schemaless entity datastore
pub struct Client {
    project: String,
    namespace: Option<String>,
    connection: Arc<dyn Connection>,
    stack: ContextStack,
    max_lookup_attempts: usize,
}

impl Client {
    /// Create a client from config and a connection
    pub fn new(config: ClientConfig, connection: Arc<dyn Connection>) -> Self {
        debug!(project = %config.project, "client created");
        Self {
            project: config.project,
            namespace: config.namespace,
            connection,
            stack: ContextStack::new(),
            max_lookup_attempts: config.max_lookup_attempts,
        }
    }

    /// Project this client is scoped to
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Namespace new keys are created in
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    // ========== Key construction ==========

    /// A partial key of `kind` in this client's project/namespace
    pub fn key(&self, kind: impl Into<String>) -> Result<Key> {
        Key::partial(self.project.clone(), self.namespace.clone(), kind)
    }

    /// A complete key with a numeric id in this client's project/namespace
    pub fn key_with_id(&self, kind: impl Into<String>, id: i64) -> Result<Key> {
        Key::with_id(self.project.clone(), self.namespace.clone(), kind, id)
    }

    /// A complete key with a string name in this client's project/namespace
    pub fn key_with_name(
        &self,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Key> {
        Key::with_name(self.project.clone(), self.namespace.clone(), kind, name)
    }

    // ========== Context management ==========

    /// Create a batch bound to this client (not started, not pushed)
    pub fn batch(&self) -> Batch {
        Batch::new(
            self.project.clone(),
            self.namespace.clone(),
            Arc::clone(&self.connection),
        )
    }

    /// Create a transaction bound to this client (not begun, not pushed)
    pub fn transaction(&self, options: TransactionOptions) -> Transaction {
        Transaction::new(
            self.project.clone(),
            self.namespace.clone(),
            Arc::clone(&self.connection),
            options,
        )
    }

    /// Push a context; implicit mutations now target it
    pub fn push_context(&self, context: Context) {
        self.stack.push(context);
    }

    /// Pop a context, verifying it is the current top
    ///
    /// # Errors
    ///
    /// `IllegalState` when the stack is empty or `context` is not the top.
    pub fn pop_context(&self, context: &Context) -> Result<Context> {
        self.stack.pop(context)
    }

    /// The innermost active batch, if any
    pub fn current_batch(&self) -> Option<Batch> {
        self.stack.current_batch()
    }

    /// The innermost active context, only if it is a transaction
    pub fn current_transaction(&self) -> Option<Transaction> {
        self.stack.current_transaction()
    }

    /// Run `f` inside a scoped batch
    ///
    /// The batch is begun and pushed before `f` runs. On `Ok` the batch is
    /// committed; on `Err` it is rolled back and the original error is
    /// surfaced. The context stack is popped on every exit path, including
    /// a failed commit.
    pub fn in_batch<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Batch) -> Result<T>,
    {
        let batch = self.batch();
        batch.begin()?;
        let context = Context::Batch(batch.clone());
        self.stack.push(context.clone());

        let outcome = match f(&batch) {
            Ok(value) => batch.commit().map(|_| value),
            Err(err) => {
                // Keep the caller's error; rollback on a live batch is local
                // and cannot meaningfully fail.
                let _ = batch.rollback();
                Err(err)
            }
        };

        let popped = self.stack.pop(&context);
        let value = outcome?;
        popped?;
        Ok(value)
    }

    /// Run `f` inside a scoped transaction
    ///
    /// Same contract as [`Client::in_batch`], with an explicit abort RPC on
    /// the error path. A rollback failure is dropped in favor of the
    /// caller's original error.
    pub fn in_transaction<T, F>(&self, options: TransactionOptions, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        let txn = self.transaction(options);
        txn.begin()?;
        let context = Context::Transaction(txn.clone());
        self.stack.push(context.clone());

        let outcome = match f(&txn) {
            Ok(value) => txn.commit().map(|_| value),
            Err(err) => {
                let _ = txn.rollback();
                Err(err)
            }
        };

        let popped = self.stack.pop(&context);
        let value = outcome?;
        popped?;
        Ok(value)
    }

    // ========== Lookup engine ==========

    /// Fetch entities for `keys`
    ///
    /// Returns found entities in backend order. Keys with no stored entity
    /// are appended to `missing`; keys still deferred when the retry
    /// ceiling stops the loop are appended to `deferred`. With no explicit
    /// `transaction`, reads run under the client's current transaction, if
    /// one is active.
    ///
    /// Empty `keys` short-circuits to an empty result with no RPC.
    ///
    /// # Errors
    ///
    /// `BadRequest` (before any RPC) when any key belongs to a project other
    /// than the client's, when a supplied `missing`/`deferred` slot is
    /// non-empty, or when `eventual` is combined with a transaction.
    pub fn get_multi(
        &self,
        keys: &[Key],
        missing: Option<&mut Vec<Key>>,
        deferred: Option<&mut Vec<Key>>,
        transaction: Option<&Transaction>,
        eventual: bool,
    ) -> Result<Vec<Entity>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        if keys.iter().any(|key| key.project() != self.project) {
            return Err(Error::bad_request("keys must be from the client's project"));
        }
        if missing.as_deref().is_some_and(|m| !m.is_empty()) {
            return Err(Error::bad_request("missing output list must start empty"));
        }
        if deferred.as_deref().is_some_and(|d| !d.is_empty()) {
            return Err(Error::bad_request("deferred output list must start empty"));
        }

        let transaction = match transaction {
            Some(txn) => Some(txn.clone()),
            None => self.stack.current_transaction(),
        };
        if eventual && transaction.is_some() {
            return Err(Error::bad_request(
                "eventual consistency cannot be used inside a transaction",
            ));
        }
        let transaction_id = transaction.as_ref().and_then(|txn| txn.id());

        let found = extended_lookup(
            self.connection.as_ref(),
            &self.project,
            keys.to_vec(),
            missing,
            deferred,
            eventual,
            transaction_id.as_ref(),
            self.max_lookup_attempts,
        )?;
        Ok(found.into_iter().map(EntityData::into_entity).collect())
    }

    /// Fetch a single entity, or `None` when it does not exist
    ///
    /// Purely a convenience over [`Client::get_multi`].
    pub fn get(
        &self,
        key: &Key,
        missing: Option<&mut Vec<Key>>,
        deferred: Option<&mut Vec<Key>>,
        transaction: Option<&Transaction>,
    ) -> Result<Option<Entity>> {
        let mut entities =
            self.get_multi(std::slice::from_ref(key), missing, deferred, transaction, false)?;
        Ok(entities.pop())
    }

    // ========== Mutation dispatcher ==========

    /// Save entities
    ///
    /// With an active batch/transaction on the context stack, mutations are
    /// appended there and no RPC is issued; the caller commits eventually.
    /// Otherwise a transient batch is begun, filled and committed
    /// synchronously, and every entity whose key was partial at call time
    /// gets its backend-completed key installed in place (matched by
    /// position).
    ///
    /// Empty input is a no-op with no RPC.
    ///
    /// # Errors
    ///
    /// `BadRequest` when any entity lacks a key or belongs to a foreign
    /// project; commit failures are surfaced unchanged.
    pub fn put_multi(&self, entities: &mut [Entity]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        for entity in entities.iter() {
            if entity.key().is_none() {
                return Err(Error::bad_request("entity is missing a key"));
            }
        }

        if let Some(batch) = self.stack.current_batch() {
            for entity in entities.iter() {
                batch.put(entity)?;
            }
            trace!(count = entities.len(), "mutations routed to active context");
            return Ok(());
        }

        let batch = self.batch();
        batch.begin()?;
        for entity in entities.iter() {
            batch.put(entity)?;
        }
        let summary = batch.commit()?;

        // The backend returns one completed key per insert-on-partial
        // mutation, in submission order.
        let mut completed = summary.completed_keys.into_iter();
        for entity in entities.iter_mut() {
            let was_partial = entity.key().is_some_and(Key::is_partial);
            if was_partial {
                if let Some(key) = completed.next() {
                    entity.set_key(key);
                }
            }
        }
        Ok(())
    }

    /// Save a single entity
    pub fn put(&self, entity: &mut Entity) -> Result<()> {
        self.put_multi(std::slice::from_mut(entity))
    }

    /// Delete entities by key
    ///
    /// Routing mirrors [`Client::put_multi`]: active context or transient
    /// auto-committed batch. Empty input is a no-op with no RPC.
    pub fn delete_multi(&self, keys: &[Key]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        if let Some(batch) = self.stack.current_batch() {
            for key in keys {
                batch.delete(key)?;
            }
            trace!(count = keys.len(), "deletes routed to active context");
            return Ok(());
        }

        let batch = self.batch();
        batch.begin()?;
        for key in keys {
            batch.delete(key)?;
        }
        batch.commit()?;
        Ok(())
    }

    /// Delete a single entity by key
    pub fn delete(&self, key: &Key) -> Result<()> {
        self.delete_multi(std::slice::from_ref(key))
    }

    // ========== ID allocator ==========

    /// Allocate `num_ids` backend-assigned ids for a partial key
    ///
    /// Returns completed keys in request order. `num_ids == 0` returns an
    /// empty list with no RPC.
    ///
    /// # Errors
    ///
    /// `BadRequest` when the key is already complete.
    pub fn allocate_ids(&self, incomplete_key: &Key, num_ids: usize) -> Result<Vec<Key>> {
        if !incomplete_key.is_partial() {
            return Err(Error::bad_request(
                "only a partial key can be used for id allocation",
            ));
        }
        if num_ids == 0 {
            return Ok(Vec::new());
        }
        let request: Vec<Key> = std::iter::repeat_with(|| incomplete_key.clone())
            .take(num_ids)
            .collect();
        self.connection
            .allocate_ids(incomplete_key.project(), &request)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("project", &self.project)
            .field("namespace", &self.namespace)
            .field("context_depth", &self.stack.depth())
            .finish()
    }
}
