//! Scripted in-memory `Connection` for tests
//!
//! `MockConnection` stands in for the transport layer. Lookup responses are
//! scripted FIFO; commits complete partial-key inserts with sequential ids;
//! transaction ids are sequential counters. Every RPC is recorded so tests
//! can assert exact call sequences, including that a rejected call issued
//! zero RPCs.
//!
//! An unscripted lookup reports every requested key missing.

use crate::batch::Mutation;
use crate::connection::{
    CommitResults, Connection, LookupResults, TransactionId, TransactionOptions,
};
use lodestore_core::{Error, Key, PathId, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// A record of one RPC the mock received
#[derive(Debug, Clone, PartialEq)]
pub enum CallRecord {
    /// A `lookup` call
    Lookup {
        /// Project the lookup targeted
        project: String,
        /// Keys requested in this pass
        keys: Vec<Key>,
        /// Eventual-consistency flag
        eventual: bool,
        /// Transaction the read ran under, if any
        transaction: Option<TransactionId>,
    },
    /// A `commit` call
    Commit {
        /// Project the commit targeted
        project: String,
        /// Wire verbs of the submitted mutations, in order
        verbs: Vec<&'static str>,
        /// Transaction the commit ran under, if any
        transaction: Option<TransactionId>,
    },
    /// An `allocate_ids` call
    AllocateIds {
        /// Project the allocation targeted
        project: String,
        /// Number of keys requested
        count: usize,
    },
    /// A `begin_transaction` call
    BeginTransaction {
        /// Project the transaction targeted
        project: String,
        /// Whether read-only options were requested
        read_only: bool,
    },
    /// A `rollback` call
    Rollback {
        /// Project the rollback targeted
        project: String,
        /// The aborted transaction
        transaction: TransactionId,
    },
}

#[derive(Default)]
struct Failures {
    lookup: Option<String>,
    commit: Option<String>,
    begin: Option<String>,
    rollback: Option<String>,
    allocate: Option<String>,
}

/// Scripted in-memory connection
#[derive(Default)]
pub struct MockConnection {
    lookups: Mutex<VecDeque<LookupResults>>,
    calls: Mutex<Vec<CallRecord>>,
    failures: Mutex<Failures>,
    next_id: AtomicI64,
    next_txn: AtomicU64,
}

impl MockConnection {
    /// Create a mock with no scripted responses
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            next_txn: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Queue a lookup response (FIFO)
    pub fn push_lookup(&self, results: LookupResults) {
        self.lookups.lock().push_back(results);
    }

    /// Make the next `lookup` fail with an RPC error
    pub fn fail_next_lookup(&self, message: &str) {
        self.failures.lock().lookup = Some(message.to_string());
    }

    /// Make the next `commit` fail with an RPC error
    pub fn fail_next_commit(&self, message: &str) {
        self.failures.lock().commit = Some(message.to_string());
    }

    /// Make the next `begin_transaction` fail with an RPC error
    pub fn fail_next_begin(&self, message: &str) {
        self.failures.lock().begin = Some(message.to_string());
    }

    /// Make the next `rollback` fail with an RPC error
    pub fn fail_next_rollback(&self, message: &str) {
        self.failures.lock().rollback = Some(message.to_string());
    }

    /// Make the next `allocate_ids` fail with an RPC error
    pub fn fail_next_allocate(&self, message: &str) {
        self.failures.lock().allocate = Some(message.to_string());
    }

    /// Everything this mock has received, in order
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().clone()
    }

    /// Number of `lookup` calls received
    pub fn lookup_count(&self) -> usize {
        self.count(|call| matches!(call, CallRecord::Lookup { .. }))
    }

    /// Number of `commit` calls received
    pub fn commit_count(&self) -> usize {
        self.count(|call| matches!(call, CallRecord::Commit { .. }))
    }

    /// The key lists of each `lookup` call, in order
    pub fn lookup_requests(&self) -> Vec<Vec<Key>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                CallRecord::Lookup { keys, .. } => Some(keys.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&CallRecord) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    fn complete(&self, key: &Key) -> Key {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        key.completed(PathId::Id(id))
            .expect("mock only completes partial keys")
    }
}

impl Connection for MockConnection {
    fn lookup(
        &self,
        project: &str,
        keys: &[Key],
        eventual: bool,
        transaction: Option<&TransactionId>,
    ) -> Result<LookupResults> {
        self.calls.lock().push(CallRecord::Lookup {
            project: project.to_string(),
            keys: keys.to_vec(),
            eventual,
            transaction: transaction.cloned(),
        });
        if let Some(message) = self.failures.lock().lookup.take() {
            return Err(Error::rpc(message));
        }
        Ok(self.lookups.lock().pop_front().unwrap_or_else(|| {
            // Unscripted: everything is missing
            LookupResults {
                missing: keys.to_vec(),
                ..LookupResults::default()
            }
        }))
    }

    fn commit(
        &self,
        project: &str,
        mutations: &[Mutation],
        transaction: Option<&TransactionId>,
    ) -> Result<CommitResults> {
        self.calls.lock().push(CallRecord::Commit {
            project: project.to_string(),
            verbs: mutations.iter().map(Mutation::verb).collect(),
            transaction: transaction.cloned(),
        });
        if let Some(message) = self.failures.lock().commit.take() {
            return Err(Error::rpc(message));
        }
        let completed_keys = mutations
            .iter()
            .filter(|mutation| mutation.completes_key())
            .map(|mutation| self.complete(mutation.key()))
            .collect();
        Ok(CommitResults {
            index_updates: mutations.len() as u64,
            completed_keys,
        })
    }

    fn allocate_ids(&self, project: &str, incomplete_keys: &[Key]) -> Result<Vec<Key>> {
        self.calls.lock().push(CallRecord::AllocateIds {
            project: project.to_string(),
            count: incomplete_keys.len(),
        });
        if let Some(message) = self.failures.lock().allocate.take() {
            return Err(Error::rpc(message));
        }
        Ok(incomplete_keys.iter().map(|key| self.complete(key)).collect())
    }

    fn begin_transaction(
        &self,
        project: &str,
        options: &TransactionOptions,
    ) -> Result<TransactionId> {
        self.calls.lock().push(CallRecord::BeginTransaction {
            project: project.to_string(),
            read_only: options.read_only,
        });
        if let Some(message) = self.failures.lock().begin.take() {
            return Err(Error::rpc(message));
        }
        let id = self.next_txn.fetch_add(1, Ordering::SeqCst);
        Ok(TransactionId::new(id.to_be_bytes().to_vec()))
    }

    fn rollback(&self, project: &str, transaction: &TransactionId) -> Result<()> {
        self.calls.lock().push(CallRecord::Rollback {
            project: project.to_string(),
            transaction: transaction.clone(),
        });
        if let Some(message) = self.failures.lock().rollback.take() {
            return Err(Error::rpc(message));
        }
        Ok(())
    }
}
