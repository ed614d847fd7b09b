//! Transaction and Context Stack Tests
//!
//! Lifecycle of batches and transactions driven through the client:
//! scoped helpers, LIFO context routing, rollback semantics, and
//! transaction-scoped reads.

use lodestore::testing::{CallRecord, MockConnection};
use lodestore::{
    BatchStatus, Client, ClientConfig, Context, Entity, Error, Result, TransactionOptions,
};
use std::sync::Arc;

fn client() -> (Arc<MockConnection>, Client) {
    let connection = Arc::new(MockConnection::new());
    let client = Client::new(ClientConfig::new("demo-project"), connection.clone());
    (connection, client)
}

fn task(client: &Client, id: i64) -> Entity {
    Entity::with_key(client.key_with_id("Task", id).unwrap())
}

// ============================================================================
// Scoped batches
// ============================================================================

#[test]
fn in_batch_commits_once_on_success() {
    let (connection, client) = client();
    client
        .in_batch(|_batch| {
            client.put(&mut task(&client, 1))?;
            client.put(&mut task(&client, 2))?;
            Ok(())
        })
        .unwrap();

    // Both puts landed in one commit
    assert_eq!(connection.commit_count(), 1);
    assert!(connection.calls().iter().any(|call| matches!(
        call,
        CallRecord::Commit { verbs, .. } if verbs == &vec!["upsert", "upsert"]
    )));
    assert!(client.current_batch().is_none());
}

#[test]
fn in_batch_discards_mutations_on_error() {
    let (connection, client) = client();
    let result: Result<()> = client.in_batch(|_batch| {
        client.put(&mut task(&client, 1))?;
        Err(Error::bad_request("caller bailed"))
    });

    assert!(matches!(result, Err(Error::BadRequest(_))));
    // Plain batch rollback is local: nothing reached the wire
    assert!(connection.calls().is_empty());
    assert!(client.current_batch().is_none());
}

#[test]
fn in_batch_surfaces_commit_failure_with_clean_stack() {
    let (connection, client) = client();
    connection.fail_next_commit("backend unavailable");

    let result = client.in_batch(|_batch| client.put(&mut task(&client, 1)));
    assert!(matches!(result, Err(Error::Rpc(_))));
    assert!(client.current_batch().is_none());
}

// ============================================================================
// Scoped transactions
// ============================================================================

#[test]
fn in_transaction_begins_and_commits_under_one_id() {
    let (connection, client) = client();
    client
        .in_transaction(TransactionOptions::default(), |txn| {
            assert!(txn.id().is_some());
            client.put(&mut task(&client, 1))
        })
        .unwrap();

    let calls = connection.calls();
    assert!(matches!(calls[0], CallRecord::BeginTransaction { .. }));
    assert!(matches!(
        calls[1],
        CallRecord::Commit { transaction: Some(_), .. }
    ));
    assert!(client.current_transaction().is_none());
}

#[test]
fn in_transaction_rolls_back_on_error() {
    let (connection, client) = client();
    let result: Result<()> = client.in_transaction(TransactionOptions::default(), |_txn| {
        client.put(&mut task(&client, 1))?;
        Err(Error::bad_request("caller bailed"))
    });

    assert!(matches!(result, Err(Error::BadRequest(_))));
    let calls = connection.calls();
    assert!(matches!(calls[0], CallRecord::BeginTransaction { .. }));
    assert!(matches!(calls[1], CallRecord::Rollback { .. }));
    assert_eq!(connection.commit_count(), 0);
}

#[test]
fn in_transaction_keeps_original_error_when_rollback_fails() {
    let (connection, client) = client();
    connection.fail_next_rollback("backend unavailable");

    let result: Result<()> = client.in_transaction(TransactionOptions::default(), |_txn| {
        Err(Error::bad_request("caller bailed"))
    });
    // The rollback RPC error is dropped in favor of the caller's error
    assert!(matches!(result, Err(Error::BadRequest(_))));
    assert!(client.current_transaction().is_none());
}

#[test]
fn failed_begin_surfaces_without_pushing_context() {
    let (connection, client) = client();
    connection.fail_next_begin("backend unavailable");

    let result: Result<()> =
        client.in_transaction(TransactionOptions::default(), |_txn| Ok(()));
    assert!(matches!(result, Err(Error::Rpc(_))));
    assert!(client.current_transaction().is_none());
    // Only the failed begin reached the wire
    assert_eq!(connection.calls().len(), 1);
}

#[test]
fn read_only_options_reach_the_backend() {
    let (connection, client) = client();
    client
        .in_transaction(TransactionOptions::read_only(), |_txn| Ok(()))
        .unwrap();
    assert!(matches!(
        connection.calls()[0],
        CallRecord::BeginTransaction { read_only: true, .. }
    ));
}

// ============================================================================
// Transaction-scoped reads
// ============================================================================

#[test]
fn reads_inside_transaction_carry_its_id() {
    let (connection, client) = client();
    client
        .in_transaction(TransactionOptions::default(), |txn| {
            let id = txn.id().unwrap();
            let key = client.key_with_id("Task", 1).unwrap();
            client.get(&key, None, None, None)?;

            let lookup_used_id = connection.calls().iter().any(|call| matches!(
                call,
                CallRecord::Lookup { transaction: Some(t), .. } if *t == id
            ));
            assert!(lookup_used_id);
            Ok(())
        })
        .unwrap();
}

#[test]
fn eventual_read_inside_transaction_rejected() {
    let (connection, client) = client();
    client
        .in_transaction(TransactionOptions::default(), |_txn| {
            let key = client.key_with_id("Task", 1).unwrap();
            let result = client.get_multi(&[key], None, None, None, true);
            assert!(matches!(result, Err(Error::BadRequest(_))));
            Ok(())
        })
        .unwrap();
    assert_eq!(connection.lookup_count(), 0);
}

#[test]
fn reads_outside_any_context_carry_no_id() {
    let (connection, client) = client();
    let key = client.key_with_id("Task", 1).unwrap();
    client.get(&key, None, None, None).unwrap();

    assert!(matches!(
        connection.calls()[0],
        CallRecord::Lookup { transaction: None, .. }
    ));
}

// ============================================================================
// Context stack discipline
// ============================================================================

#[test]
fn innermost_context_wins() {
    let (connection, client) = client();
    client
        .in_transaction(TransactionOptions::default(), |txn| {
            client.in_batch(|batch| {
                client.put(&mut task(&client, 1))?;
                assert_eq!(batch.mutation_count(), 1);
                assert_eq!(txn.mutation_count(), 0);
                Ok(())
            })
        })
        .unwrap();

    // The inner batch committed outside the transaction
    assert!(connection.calls().iter().any(|call| matches!(
        call,
        CallRecord::Commit { transaction: None, .. }
    )));
}

#[test]
fn nested_transactions_use_distinct_backend_ids() {
    let (connection, client) = client();
    client
        .in_transaction(TransactionOptions::default(), |outer| {
            let outer_id = outer.id().unwrap();
            client.in_transaction(TransactionOptions::default(), |inner| {
                assert_ne!(inner.id().unwrap(), outer_id);
                client.put(&mut task(&client, 1))
            })
        })
        .unwrap();

    let begins = connection
        .calls()
        .iter()
        .filter(|call| matches!(call, CallRecord::BeginTransaction { .. }))
        .count();
    assert_eq!(begins, 2);
}

#[test]
fn mismatched_pop_is_rejected_and_stack_survives() {
    let (_connection, client) = client();
    let on_stack = client.batch();
    on_stack.begin().unwrap();
    let context = Context::Batch(on_stack.clone());
    client.push_context(context.clone());

    let stranger = client.batch();
    stranger.begin().unwrap();
    let result = client.pop_context(&Context::Batch(stranger));
    assert!(matches!(result, Err(Error::IllegalState(_))));

    // The original context is still routable
    assert!(client.current_batch().is_some());
    client.pop_context(&context).unwrap();
}

#[test]
fn pop_on_empty_stack_is_rejected() {
    let (_connection, client) = client();
    let batch = client.batch();
    let result = client.pop_context(&Context::Batch(batch));
    assert!(matches!(result, Err(Error::IllegalState(_))));
}

// ============================================================================
// Manual lifecycle
// ============================================================================

#[test]
fn manual_transaction_retry_after_failed_commit() {
    let (connection, client) = client();
    let txn = client.transaction(TransactionOptions::default());
    txn.begin().unwrap();
    txn.put(&task(&client, 1)).unwrap();

    connection.fail_next_commit("backend unavailable");
    assert!(txn.commit().is_err());
    assert_eq!(txn.status(), BatchStatus::InProgress);
    assert!(txn.id().is_some());

    txn.commit().unwrap();
    assert_eq!(txn.status(), BatchStatus::Finished);
    assert!(txn.id().is_none());
}

#[test]
fn finished_transaction_rejects_further_mutations() {
    let (_connection, client) = client();
    let txn = client.transaction(TransactionOptions::default());
    txn.begin().unwrap();
    txn.commit().unwrap();

    let result = txn.put(&task(&client, 1));
    assert!(matches!(result, Err(Error::BadRequest(_))));
}
