//! The change-batch unit produced by collections and consumed by query
//! operators (spec.md §3 "Change<T>", §4.1 "Change-batch emission policy").

use crate::key::Key;
use std::fmt;

/// The kind of a single-row change within a change batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "insert"),
            ChangeKind::Update => write!(f, "update"),
            ChangeKind::Delete => write!(f, "delete"),
        }
    }
}

/// A single-row change, the unit of a change batch.
///
/// `value` carries the row as it is after the change (for `Insert`/`Update`)
/// or as it was before removal (for `Delete`). `previous_value` is only
/// ever populated for `Update`, matching spec.md §3's optional
/// `previousValue`.
#[derive(Clone, Debug)]
pub struct Change<T> {
    pub kind: ChangeKind,
    pub key: Key,
    pub value: T,
    pub previous_value: Option<T>,
}

impl<T> Change<T> {
    pub fn insert(key: Key, value: T) -> Self {
        Change { kind: ChangeKind::Insert, key, value, previous_value: None }
    }

    pub fn update(key: Key, value: T, previous_value: T) -> Self {
        Change { kind: ChangeKind::Update, key, value, previous_value: Some(previous_value) }
    }

    pub fn delete(key: Key, value: T) -> Self {
        Change { kind: ChangeKind::Delete, key, value, previous_value: None }
    }

    pub fn is_insert(&self) -> bool {
        self.kind == ChangeKind::Insert
    }

    pub fn is_update(&self) -> bool {
        self.kind == ChangeKind::Update
    }

    pub fn is_delete(&self) -> bool {
        self.kind == ChangeKind::Delete
    }

    pub fn map<U>(self, f: impl Fn(T) -> U) -> Change<U> {
        Change {
            kind: self.kind,
            key: self.key,
            value: f(self.value),
            previous_value: self.previous_value.map(f),
        }
    }
}

/// A non-empty, order-preserving sequence of changes, as emitted by a
/// collection after any state transition (spec.md §3's "Change batch").
/// A batch containing only no-op diffs must be suppressed before
/// construction — see `rivet_collection`'s emission policy.
pub type ChangeBatch<T> = Vec<Change<T>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Row;
    use crate::Value;

    #[test]
    fn insert_has_no_previous_value() {
        let row = Row::from_pairs(vec![("a", Value::Int(1))]);
        let change = Change::insert(Key::Int(1), row);
        assert!(change.is_insert());
        assert!(change.previous_value.is_none());
    }

    #[test]
    fn update_carries_previous_value() {
        let old = Row::from_pairs(vec![("a", Value::Int(1))]);
        let new = Row::from_pairs(vec![("a", Value::Int(2))]);
        let change = Change::update(Key::Int(1), new.clone(), old.clone());
        assert!(change.is_update());
        assert_eq!(change.previous_value, Some(old));
        assert_eq!(change.value, new);
    }

    #[test]
    fn map_transforms_both_value_and_previous() {
        let change = Change::update(Key::Int(1), 2i64, 1i64);
        let mapped = change.map(|v| v * 10);
        assert_eq!(mapped.value, 20);
        assert_eq!(mapped.previous_value, Some(10));
    }
}
