//! Incremental order/limit operator (spec.md §4.4 "OrderLimit(orderBy,
//! limit?, offset?)").
//!
//! Maintains the full sorted multiset of rows seen so far (tie-broken on
//! row key for a deterministic order among equal sort keys), and on each
//! batch recomputes which rows fall inside the `[offset, offset+limit)`
//! window, emitting `enter`/`leave` events only for rows that crossed the
//! boundary. A plain value change for a row that stays in (or out of) the
//! window never reaches downstream as a spurious update.

use rivet_core::{Change, ChangeKind, Key, Row};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

/// Compares two rows for sort order; ties are broken by row key so the
/// window boundary is deterministic.
pub type RowComparator = Rc<dyn Fn(&Row, &Row) -> Ordering>;

pub struct OrderLimitOperator {
    compare: RowComparator,
    offset: usize,
    limit: Option<usize>,
    rows: Vec<(Key, Row)>,
}

impl OrderLimitOperator {
    pub fn new(compare: RowComparator, offset: usize, limit: Option<usize>) -> Self {
        OrderLimitOperator { compare, offset, limit, rows: Vec::new() }
    }

    fn window_end(&self) -> usize {
        match self.limit {
            Some(l) => (self.offset + l).min(self.rows.len()),
            None => self.rows.len(),
        }
    }

    fn window(&self) -> &[(Key, Row)] {
        let start = self.offset.min(self.rows.len());
        let end = self.window_end();
        &self.rows[start..end]
    }

    fn position_for(&self, key: &Key, row: &Row) -> usize {
        self.rows
            .binary_search_by(|(k, r)| (self.compare)(r, row).then_with(|| k.cmp(key)))
            .unwrap_or_else(|pos| pos)
    }

    fn remove(&mut self, key: &Key) -> Option<Row> {
        let pos = self.rows.iter().position(|(k, _)| k == key)?;
        Some(self.rows.remove(pos).1)
    }

    fn insert(&mut self, key: Key, row: Row) {
        let pos = self.position_for(&key, &row);
        self.rows.insert(pos, (key, row));
    }

    pub fn apply(&mut self, batch: &[Change<Row>]) -> Vec<Change<Row>> {
        let before: HashMap<Key, Row> = self.window().iter().cloned().collect();

        for change in batch {
            match change.kind {
                ChangeKind::Insert => self.insert(change.key.clone(), change.value.clone()),
                ChangeKind::Delete => {
                    self.remove(&change.key);
                }
                ChangeKind::Update => {
                    self.remove(&change.key);
                    self.insert(change.key.clone(), change.value.clone());
                }
            }
        }

        let after: HashMap<Key, Row> = self.window().iter().cloned().collect();

        let mut out = Vec::new();
        for (key, row) in &before {
            if !after.contains_key(key) {
                out.push(Change::delete(key.clone(), row.clone()));
            }
        }
        for (key, row) in &after {
            match before.get(key) {
                None => out.push(Change::insert(key.clone(), row.clone())),
                Some(old) if old != row => out.push(Change::update(key.clone(), row.clone(), old.clone())),
                Some(_) => {}
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
