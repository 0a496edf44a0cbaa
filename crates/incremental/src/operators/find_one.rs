//! Incremental find-one operator (spec.md §4.4 "FindOne" — a query with
//! `singleResult: true`).
//!
//! A thin wrapper around an [`OrderLimitOperator`] pinned to `limit = 1`:
//! the sink for a `singleResult` query is a single optional row rather than
//! an array, so this tracks that row directly instead of making callers dig
//! it out of a one-element window.

use super::order_limit::{OrderLimitOperator, RowComparator};
use rivet_core::{Change, Row};

pub struct FindOneOperator {
    window: OrderLimitOperator,
    current: Option<Row>,
}

impl FindOneOperator {
    pub fn new(compare: RowComparator) -> Self {
        FindOneOperator { window: OrderLimitOperator::new(compare, 0, Some(1)), current: None }
    }

    /// Applies a batch, returning the resulting single row (if any) only
    /// when it differs from what was already current.
    pub fn apply(&mut self, batch: &[Change<Row>]) -> Option<Row> {
        let changes = self.window.apply(batch);
        for change in changes {
            if change.is_delete() {
                self.current = None;
            } else {
                self.current = Some(change.value);
            }
        }
        self.current.clone()
    }

    pub fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_core::{Key, Value};
    use std::rc::Rc;

    fn row(age: i64) -> Row {
        Row::from_pairs(vec![("age", Value::Int(age))])
    }

    fn by_age_asc() -> RowComparator {
        Rc::new(|a: &Row, b: &Row| a.get("age").cmp(&b.get("age")))
    }

    #[test]
    fn tracks_the_single_smallest_row() {
        let mut op = FindOneOperator::new(by_age_asc());
        op.apply(&[Change::insert(Key::Int(1), row(30))]);
        let current = op.apply(&[Change::insert(Key::Int(2), row(10))]);
        assert_eq!(current, Some(row(10)));
    }

    #[test]
    fn clears_when_the_only_row_is_deleted() {
        let mut op = FindOneOperator::new(by_age_asc());
        op.apply(&[Change::insert(Key::Int(1), row(5))]);
        op.apply(&[Change::delete(Key::Int(1), row(5))]);
        assert_eq!(op.current(), None);
    }
}
