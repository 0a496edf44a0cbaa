//! Per-field secondary indexes maintained against a collection's synced
//! baseline (spec.md §4.1 "Indexing (C2)").
//!
//! Indexes are kept over `synced` only, not the optimistic overlay: the
//! overlay is expected to stay small (a handful of in-flight mutations),
//! so a query compiler that pushes a predicate down to an index still
//! needs to separately linear-scan the optimistic list for matches —
//! mirrored in `rivet_query`'s scan operator.

use rivet_core::{Key, Row, Value};
use rivet_index::{BTreeIndex, HashIndex, Index, KeyRange, RangeIndex};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexKind {
    Equality,
    Ordered,
}

enum IndexHandle {
    Equality(HashIndex),
    Ordered(BTreeIndex),
}

impl IndexHandle {
    fn new(kind: IndexKind) -> Self {
        match kind {
            IndexKind::Equality => IndexHandle::Equality(HashIndex::new(false)),
            IndexKind::Ordered => IndexHandle::Ordered(BTreeIndex::new(64, false)),
        }
    }

    fn add(&mut self, value: Value, key: Key) {
        let _ = match self {
            IndexHandle::Equality(h) => h.add(value, key),
            IndexHandle::Ordered(b) => b.add(value, key),
        };
    }

    fn remove(&mut self, value: &Value, key: Option<&Key>) {
        match self {
            IndexHandle::Equality(h) => h.remove(value, key),
            IndexHandle::Ordered(b) => b.remove(value, key),
        }
    }

    fn get(&self, value: &Value) -> Vec<Key> {
        match self {
            IndexHandle::Equality(h) => h.get(value),
            IndexHandle::Ordered(b) => b.get(value),
        }
    }

    fn get_range(&self, range: Option<&KeyRange<Value>>, reverse: bool, limit: Option<usize>, skip: usize) -> Option<Vec<Key>> {
        match self {
            IndexHandle::Ordered(b) => Some(b.get_range(range, reverse, limit, skip)),
            IndexHandle::Equality(_) => None,
        }
    }

    fn clear(&mut self) {
        match self {
            IndexHandle::Equality(h) => h.clear(),
            IndexHandle::Ordered(b) => b.clear(),
        }
    }
}

/// A named, per-field index set over one collection's rows.
#[derive(Default)]
pub struct IndexSet {
    entries: HashMap<String, (IndexKind, IndexHandle)>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    pub fn kind_of(&self, field: &str) -> Option<IndexKind> {
        self.entries.get(field).map(|(kind, _)| *kind)
    }

    /// Creates an index over `field` if one doesn't already exist, then
    /// backfills it from `rows`.
    pub fn ensure<'a>(&mut self, field: &str, kind: IndexKind, rows: impl Iterator<Item = (&'a Key, &'a Row)>) {
        if self.entries.contains_key(field) {
            return;
        }
        let mut handle = IndexHandle::new(kind);
        for (key, row) in rows {
            if let Some(value) = row.get(field) {
                handle.add(value.clone(), key.clone());
            }
        }
        self.entries.insert(field.to_string(), (kind, handle));
    }

    pub fn on_row_removed(&mut self, key: &Key, row: &Row) {
        for (field, (_, handle)) in self.entries.iter_mut() {
            if let Some(value) = row.get(field) {
                handle.remove(value, Some(key));
            }
        }
    }

    pub fn on_row_inserted(&mut self, key: &Key, row: &Row) {
        for (field, (_, handle)) in self.entries.iter_mut() {
            if let Some(value) = row.get(field) {
                handle.add(value.clone(), key.clone());
            }
        }
    }

    pub fn on_row_updated(&mut self, key: &Key, old: &Row, new: &Row) {
        self.on_row_removed(key, old);
        self.on_row_inserted(key, new);
    }

    pub fn clear_all(&mut self) {
        for (_, handle) in self.entries.values_mut() {
            handle.clear();
        }
    }

    /// Equality lookup against an indexed field, if one exists.
    pub fn lookup_eq(&self, field: &str, value: &Value) -> Option<Vec<Key>> {
        self.entries.get(field).map(|(_, handle)| handle.get(value))
    }

    /// Range lookup against an ordered index, if one exists for `field`.
    pub fn lookup_range(&self, field: &str, range: &KeyRange<Value>) -> Option<Vec<Key>> {
        self.entries.get(field).and_then(|(_, handle)| handle.get_range(Some(range), false, None, 0))
    }
}
