//! The transaction manager (spec.md §4.2, component C4).
//!
//! Grounded in the teacher's `cynos-storage::Transaction` (monotonic atomic
//! id counter, `Active/Committed/RolledBack` state guard on every mutating
//! call), generalized from "journal of table ops replayed on rollback" to
//! "optimistic overlay ops retracted on rollback" and from one table to
//! many collections.

use crate::mutation::{Mutation, MutationLog};
use rivet_collection::Collection;
use rivet_core::{Error, Key, Result, Row};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    Persisting,
    Completed,
    Failed,
}

/// A unit of work spanning one or more collections (spec.md §3
/// `Transaction<T>`). `T` is the caller's opaque `metadata` payload.
pub struct Transaction<T = ()> {
    id: u64,
    state: TransactionState,
    mutations: MutationLog,
    metadata: T,
}

impl<T> Transaction<T> {
    pub fn begin(metadata: T) -> Self {
        Transaction { id: NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst), state: TransactionState::Pending, mutations: MutationLog::new(), metadata }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn metadata(&self) -> &T {
        &self.metadata
    }

    pub fn mutations(&self) -> &[Mutation] {
        self.mutations.as_slice()
    }

    /// `(collection_id, key)` pairs touched by this transaction — what a
    /// caller iterates to retract this transaction's optimistic ops from
    /// each collection after commit or rollback settles.
    pub fn touched(&self) -> impl Iterator<Item = (&str, &Key)> {
        self.mutations.as_slice().iter().map(|m| (m.collection_id.as_str(), &m.key))
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.state != TransactionState::Pending {
            return Err(Error::NoActiveTransaction);
        }
        Ok(())
    }

    /// Appends an optimistic insert to `collection` and records the
    /// resulting mutation, merged per spec.md §3's same-key rules.
    pub fn insert<U>(&mut self, collection: &mut Collection<U>, row: Row) -> Result<Key> {
        self.ensure_pending()?;
        let key = collection.apply_insert(self.id, row.clone())?;
        self.mutations.record_insert(collection.id().to_string(), key.clone(), row);
        Ok(key)
    }

    /// Appends an optimistic update to `collection` and records the
    /// resulting mutation, merged per spec.md §3's same-key rules.
    pub fn update<U>(&mut self, collection: &mut Collection<U>, key: &Key, mutator: impl FnOnce(&Row) -> Row) -> Result<()> {
        self.ensure_pending()?;
        let before = collection.get(key).ok_or_else(|| Error::key_not_found(collection.id(), key.clone()))?;
        collection.apply_update(self.id, key, mutator)?;
        if let Some(after) = collection.get(key) {
            self.mutations.record_update(collection.id().to_string(), key.clone(), before, after);
        }
        Ok(())
    }

    /// Appends an optimistic delete to `collection` and records the
    /// resulting mutation, merged per spec.md §3's same-key rules.
    pub fn delete<U>(&mut self, collection: &mut Collection<U>, key: &Key) -> Result<()> {
        self.ensure_pending()?;
        let before = collection.get(key).ok_or_else(|| Error::key_not_found(collection.id(), key.clone()))?;
        collection.apply_delete(self.id, key)?;
        self.mutations.record_delete(collection.id().to_string(), key.clone(), before);
        Ok(())
    }

    /// Transitions `pending -> persisting`, invokes `mutation_fn` with the
    /// final merged mutation list, and settles `completed`/`failed`
    /// accordingly.
    ///
    /// The core guarantees at-most-once invocation (this method itself only
    /// runs `mutation_fn` when called, and `ensure_pending` blocks a second
    /// call). `mutation_fn` runs synchronously to completion rather than
    /// being exposed as a polled future: the actual network round-trip is a
    /// binding-layer concern outside this crate's scope (spec.md §1 excludes
    /// server-sync adapters), and no async runtime is pulled in to support
    /// it here.
    ///
    /// On either outcome, the caller is responsible for calling
    /// `Collection::retract_txn(txn.id())` on every collection named by
    /// `touched()` — this is what removes the now-redundant (on success) or
    /// rolled-back (on failure) optimistic ops.
    pub fn commit(&mut self, mutation_fn: impl FnOnce(&[Mutation]) -> std::result::Result<(), String>) -> Result<()> {
        self.ensure_pending()?;
        self.state = TransactionState::Persisting;
        match mutation_fn(self.mutations.as_slice()) {
            Ok(()) => {
                self.state = TransactionState::Completed;
                Ok(())
            }
            Err(message) => {
                log::warn!("transaction {}: persist failed: {message}", self.id);
                self.state = TransactionState::Failed;
                Err(Error::persist_failure(message))
            }
        }
    }

    /// Rolls back a still-pending transaction without attempting to
    /// persist. As with `commit`, the caller must retract this
    /// transaction's ops from every touched collection afterwards.
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_pending()?;
        self.state = TransactionState::Failed;
        Ok(())
    }
}

/// `createOptimisticAction` sugar (spec.md §4.2): runs `on_mutate` inside a
/// fresh transaction, then commits via `mutation_fn`. Returns the
/// transaction regardless of outcome so the caller can inspect
/// `state()`/`mutations()` and perform the `retract_txn` cleanup pass.
pub fn create_optimistic_action<T>(
    metadata: T,
    on_mutate: impl FnOnce(&mut Transaction<T>),
    mutation_fn: impl FnOnce(&[Mutation]) -> std::result::Result<(), String>,
) -> Transaction<T> {
    let mut txn = Transaction::begin(metadata);
    on_mutate(&mut txn);
    let _ = txn.commit(mutation_fn);
    txn
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_collection::CollectionConfig;
    use rivet_core::Value;

    fn row(id: i64, name: &str) -> Row {
        Row::from_pairs(vec![("id", Value::Int(id)), ("name", Value::String(name.to_string()))])
    }

    #[test]
    fn begin_assigns_monotonic_ids() {
        let a: Transaction = Transaction::begin(());
        let b: Transaction = Transaction::begin(());
        assert!(b.id() > a.id());
    }

    #[test]
    fn insert_through_transaction_is_visible_immediately() {
        let mut users = Collection::new("users", CollectionConfig::with_id_key());
        let mut txn: Transaction = Transaction::begin(());
        let key = txn.insert(&mut users, row(1, "alice")).unwrap();
        assert_eq!(users.get(&key), Some(row(1, "alice")));
        assert_eq!(txn.mutations().len(), 1);
    }

    #[test]
    fn mutate_outside_pending_fails() {
        let mut users = Collection::new("users", CollectionConfig::with_id_key());
        let mut txn: Transaction = Transaction::begin(());
        txn.insert(&mut users, row(1, "alice")).unwrap();
        txn.commit(|_| Ok(())).unwrap();
        let err = txn.insert(&mut users, row(2, "bob")).unwrap_err();
        assert_eq!(err.kind(), "NoActiveTransaction");
    }

    #[test]
    fn commit_success_transitions_to_completed() {
        let mut users = Collection::new("users", CollectionConfig::with_id_key());
        let mut txn: Transaction = Transaction::begin(());
        txn.insert(&mut users, row(1, "alice")).unwrap();
        txn.commit(|_| Ok(())).unwrap();
        assert_eq!(txn.state(), TransactionState::Completed);
    }

    #[test]
    fn commit_failure_transitions_to_failed_and_rolls_back_overlay() {
        let mut users = Collection::new("users", CollectionConfig::with_id_key());
        let mut txn: Transaction = Transaction::begin(());
        let key = txn.insert(&mut users, row(1, "alice")).unwrap();
        let err = txn.commit(|_| Err("server rejected".to_string())).unwrap_err();
        assert_eq!(err.kind(), "PersistFailure");
        assert_eq!(txn.state(), TransactionState::Failed);

        for (_, k) in txn.touched() {
            users.retract_txn(txn.id());
            let _ = k;
        }
        assert_eq!(users.get(&key), None, "rollback must remove the optimistic insert");
    }

    #[test]
    fn create_optimistic_action_runs_mutate_then_commits() {
        let mut users = Collection::new("users", CollectionConfig::with_id_key());
        let txn = create_optimistic_action(
            (),
            |txn| {
                txn.insert(&mut users, row(1, "alice")).unwrap();
            },
            |_| Ok(()),
        );
        assert_eq!(txn.state(), TransactionState::Completed);
    }
}
