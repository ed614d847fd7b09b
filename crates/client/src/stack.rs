//! Per-client LIFO stack of active batch/transaction contexts
//!
//! Implicit mutation calls (`put_multi`, `delete_multi`) always target the
//! innermost active context; lookups fall back to the innermost active
//! transaction. Nested contexts are legal: a batch may be opened for one
//! group of writes while a transaction for a broader unit of work is also
//! active.
//!
//! The stack is owned by each `Client` instance, never process-global, so
//! multiple clients in one process stay isolated. A mutex guards the vector
//! itself; sharing one client across concurrent logical units of work is
//! still a semantic mistake (see the crate docs).

use crate::batch::Batch;
use crate::transaction::Transaction;
use lodestore_core::{Error, Result};
use parking_lot::Mutex;

/// One stack entry: a plain batch or a transaction
#[derive(Debug, Clone)]
pub enum Context {
    /// A plain mutation batch
    Batch(Batch),
    /// A transaction (also usable as a mutation target via its batch)
    Transaction(Transaction),
}

impl Context {
    /// The batch mutations should be appended to
    pub fn batch(&self) -> Batch {
        match self {
            Context::Batch(batch) => batch.clone(),
            Context::Transaction(txn) => txn.batch().clone(),
        }
    }

    fn same_handle(&self, other: &Context) -> bool {
        match (self, other) {
            (Context::Batch(a), Context::Batch(b)) => a.same_handle(b),
            (Context::Transaction(a), Context::Transaction(b)) => a.same_handle(b),
            _ => false,
        }
    }
}

/// LIFO stack of active contexts, one per client
#[derive(Default)]
pub struct ContextStack {
    entries: Mutex<Vec<Context>>,
}

impl ContextStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a context onto the top
    pub fn push(&self, context: Context) {
        self.entries.lock().push(context);
    }

    /// Pop the top context, verifying it is the one the caller expects
    ///
    /// The identity check guards against mismatched scoped exits: popping
    /// out of order would silently re-route later implicit mutations.
    ///
    /// # Errors
    ///
    /// `IllegalState` when the stack is empty or `expected` is not the top.
    pub fn pop(&self, expected: &Context) -> Result<Context> {
        let mut entries = self.entries.lock();
        let top = match entries.pop() {
            Some(top) => top,
            None => return Err(Error::illegal_state("context stack is empty")),
        };
        if !top.same_handle(expected) {
            entries.push(top);
            return Err(Error::illegal_state(
                "popped context is not on top of the stack",
            ));
        }
        Ok(top)
    }

    /// The innermost active batch (a transaction exposes its inner batch)
    pub fn current_batch(&self) -> Option<Batch> {
        self.entries.lock().last().map(Context::batch)
    }

    /// The innermost context, only if it is a transaction
    pub fn current_transaction(&self) -> Option<Transaction> {
        match self.entries.lock().last() {
            Some(Context::Transaction(txn)) => Some(txn.clone()),
            _ => None,
        }
    }

    /// Number of active contexts
    pub fn depth(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no context is active
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
