//! `Mutation` — the unit recorded in a transaction's mutation list
//! (spec.md §3 `Transaction<T>`), and the same-key merge rules applied
//! each time a mutation enters a pending transaction (spec.md §3
//! "multiple mutations to the same (collection, key) are merged").

use rivet_core::{Key, Row};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

/// A single recorded mutation against one (collection, key) pair.
#[derive(Clone, Debug)]
pub struct Mutation {
    pub kind: MutationKind,
    pub collection_id: String,
    pub key: Key,
    pub old_value: Option<Row>,
    /// The row as it stands after this mutation (absent for `Delete`).
    pub new_value: Option<Row>,
}

impl Mutation {
    fn insert(collection_id: String, key: Key, value: Row) -> Self {
        Mutation { kind: MutationKind::Insert, collection_id, key, old_value: None, new_value: Some(value) }
    }

    fn update(collection_id: String, key: Key, old_value: Row, new_value: Row) -> Self {
        Mutation { kind: MutationKind::Update, collection_id, key, old_value: Some(old_value), new_value: Some(new_value) }
    }

    fn delete(collection_id: String, key: Key, old_value: Row) -> Self {
        Mutation { kind: MutationKind::Delete, collection_id, key, old_value: Some(old_value), new_value: None }
    }
}

/// An ordered, same-key-merging mutation list.
///
/// Mirrors the four merge rules of spec.md §3 exactly:
/// `insert` + `update*` collapses to one `insert` with the final value;
/// `insert` + ... + `delete` collapses to a no-op (the entry is dropped);
/// `update*` + `delete` collapses to one `delete`; successive `update`s
/// merge field-wise with last-write-wins (`Row::merged_with`).
#[derive(Default)]
pub struct MutationLog {
    entries: Vec<Mutation>,
}

impl MutationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[Mutation] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, collection_id: &str, key: &Key) -> Option<usize> {
        self.entries.iter().position(|m| m.collection_id == collection_id && &m.key == key)
    }

    pub fn record_insert(&mut self, collection_id: impl Into<String>, key: Key, value: Row) {
        let collection_id = collection_id.into();
        match self.position(&collection_id, &key) {
            // A delete followed by an insert for the same key within one
            // transaction isn't one of spec.md's named merge cases; treated
            // as the row being replaced outright.
            Some(idx) => self.entries[idx] = Mutation::insert(collection_id, key, value),
            None => self.entries.push(Mutation::insert(collection_id, key, value)),
        }
    }

    pub fn record_update(&mut self, collection_id: impl Into<String>, key: Key, old_value: Row, new_value: Row) {
        let collection_id = collection_id.into();
        match self.position(&collection_id, &key) {
            Some(idx) => {
                let existing = &mut self.entries[idx];
                match existing.kind {
                    MutationKind::Insert => {
                        let merged = existing.new_value.as_ref().unwrap().merged_with(&new_value);
                        existing.new_value = Some(merged);
                    }
                    MutationKind::Update => {
                        let merged = existing.new_value.as_ref().unwrap().merged_with(&new_value);
                        existing.new_value = Some(merged);
                    }
                    MutationKind::Delete => {
                        // update after a delete in this txn resurrects the row
                        *existing = Mutation::update(collection_id, key, old_value, new_value);
                    }
                }
            }
            None => self.entries.push(Mutation::update(collection_id, key, old_value, new_value)),
        }
    }

    pub fn record_delete(&mut self, collection_id: impl Into<String>, key: Key, old_value: Row) {
        let collection_id = collection_id.into();
        match self.position(&collection_id, &key) {
            Some(idx) => {
                let existing = &self.entries[idx];
                match existing.kind {
                    // insert + ... + delete collapses to a no-op
                    MutationKind::Insert => {
                        self.entries.remove(idx);
                    }
                    MutationKind::Update | MutationKind::Delete => {
                        let original_old = existing.old_value.clone().unwrap_or(old_value);
                        self.entries[idx] = Mutation::delete(collection_id, key, original_old);
                    }
                }
            }
            None => self.entries.push(Mutation::delete(collection_id, key, old_value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_core::Value;

    fn row(n: i64) -> Row {
        Row::from_pairs(vec![("n", Value::Int(n))])
    }

    #[test]
    fn insert_then_update_collapses_to_single_insert_with_final_value() {
        let mut log = MutationLog::new();
        log.record_insert("users", Key::Int(1), row(1));
        log.record_update("users", Key::Int(1), row(1), row(2));
        assert_eq!(log.as_slice().len(), 1);
        let m = &log.as_slice()[0];
        assert_eq!(m.kind, MutationKind::Insert);
        assert_eq!(m.new_value, Some(row(2)));
    }

    #[test]
    fn insert_then_delete_collapses_to_noop() {
        let mut log = MutationLog::new();
        log.record_insert("users", Key::Int(1), row(1));
        log.record_delete("users", Key::Int(1), row(1));
        assert!(log.is_empty());
    }

    #[test]
    fn update_then_delete_collapses_to_single_delete() {
        let mut log = MutationLog::new();
        log.record_update("users", Key::Int(1), row(1), row(2));
        log.record_delete("users", Key::Int(1), row(2));
        assert_eq!(log.as_slice().len(), 1);
        let m = &log.as_slice()[0];
        assert_eq!(m.kind, MutationKind::Delete);
        assert_eq!(m.old_value, Some(row(1)), "delete keeps the original pre-transaction value");
    }

    #[test]
    fn successive_updates_merge_field_wise_last_write_wins() {
        let mut log = MutationLog::new();
        let base = Row::from_pairs(vec![("a", Value::Int(1)), ("b", Value::Int(1))]);
        let patch1 = Row::from_pairs(vec![("a", Value::Int(2))]);
        let patch2 = Row::from_pairs(vec![("b", Value::Int(9))]);
        log.record_update("users", Key::Int(1), base.clone(), base.merged_with(&patch1));
        log.record_update("users", Key::Int(1), base, patch2);
        let merged = log.as_slice()[0].new_value.clone().unwrap();
        assert_eq!(merged.get("a"), Some(&Value::Int(2)));
        assert_eq!(merged.get("b"), Some(&Value::Int(9)));
    }

    #[test]
    fn repeated_identical_merge_is_idempotent() {
        let mut log = MutationLog::new();
        log.record_insert("users", Key::Int(1), row(1));
        log.record_update("users", Key::Int(1), row(1), row(2));
        log.record_update("users", Key::Int(1), row(1), row(2));
        assert_eq!(log.as_slice()[0].new_value, Some(row(2)));
    }

    #[test]
    fn different_keys_stay_independent() {
        let mut log = MutationLog::new();
        log.record_insert("users", Key::Int(1), row(1));
        log.record_insert("users", Key::Int(2), row(2));
        assert_eq!(log.as_slice().len(), 2);
    }
}
