//! The optimistic overlay: pending local ops layered above the synced
//! baseline (spec.md §3 "optimistic", §4.1 "Optimistic overlay semantics").

use rivet_core::{Key, Row};

/// A single pending mutation recorded against a collection by an in-flight
/// transaction, not yet reflected by the sync source.
#[derive(Clone, Debug)]
pub struct OptimisticOp {
    pub kind: OptimisticOpKind,
    pub key: Key,
    pub new_value: Option<Row>,
    pub txn_id: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimisticOpKind {
    Insert,
    Update,
    Delete,
}

impl OptimisticOp {
    pub fn insert(key: Key, value: Row, txn_id: u64) -> Self {
        OptimisticOp { kind: OptimisticOpKind::Insert, key, new_value: Some(value), txn_id }
    }

    pub fn update(key: Key, value: Row, txn_id: u64) -> Self {
        OptimisticOp { kind: OptimisticOpKind::Update, key, new_value: Some(value), txn_id }
    }

    pub fn delete(key: Key, txn_id: u64) -> Self {
        OptimisticOp { kind: OptimisticOpKind::Delete, key, new_value: None, txn_id }
    }
}

/// Folds `ops` onto `base` in insertion order, producing the value visible
/// for `key` right now, or `None` if the key is absent or was deleted.
///
/// This is `materialize(synced, optimistic)` restricted to a single key
/// (spec.md §3's core invariant).
pub fn materialize_key(base: Option<&Row>, ops: &[OptimisticOp], key: &Key) -> Option<Row> {
    let mut current = base.cloned();
    for op in ops.iter().filter(|op| &op.key == key) {
        match op.kind {
            OptimisticOpKind::Insert | OptimisticOpKind::Update => current = op.new_value.clone(),
            OptimisticOpKind::Delete => current = None,
        }
    }
    current
}

/// Returns true if `ops` contains at least one pending op for `key`.
pub fn has_pending_op(ops: &[OptimisticOp], key: &Key) -> bool {
    ops.iter().any(|op| &op.key == key)
}

/// Removes every op belonging to `txn_id` (rollback, or "completed" cleanup
/// once the sync source reflects the same effect).
///
/// This only mutates the overlay; it does not compute or emit the resulting
/// visible-value diff for affected keys. `Collection::retract_txn` wraps
/// this to do that, snapshotting `materialize_key` before and after the
/// call.
pub fn retract_txn(ops: &mut Vec<OptimisticOp>, txn_id: u64) {
    ops.retain(|op| op.txn_id != txn_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_core::Value;

    fn row(n: i64) -> Row {
        Row::from_pairs(vec![("n", Value::Int(n))])
    }

    #[test]
    fn insert_then_update_materializes_latest_value() {
        let ops = vec![
            OptimisticOp::insert(Key::Int(1), row(1), 1),
            OptimisticOp::update(Key::Int(1), row(2), 1),
        ];
        let value = materialize_key(None, &ops, &Key::Int(1));
        assert_eq!(value, Some(row(2)));
    }

    #[test]
    fn delete_after_insert_hides_the_row() {
        let ops = vec![OptimisticOp::insert(Key::Int(1), row(1), 1), OptimisticOp::delete(Key::Int(1), 1)];
        assert_eq!(materialize_key(None, &ops, &Key::Int(1)), None);
    }

    #[test]
    fn update_applies_on_top_of_synced_baseline() {
        let base = row(1);
        let ops = vec![OptimisticOp::update(Key::Int(1), row(99), 1)];
        assert_eq!(materialize_key(Some(&base), &ops, &Key::Int(1)), Some(row(99)));
    }

    #[test]
    fn retract_txn_removes_only_that_transactions_ops() {
        let mut ops = vec![
            OptimisticOp::insert(Key::Int(1), row(1), 1),
            OptimisticOp::insert(Key::Int(2), row(2), 2),
        ];
        retract_txn(&mut ops, 1);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].txn_id, 2);
    }
}
