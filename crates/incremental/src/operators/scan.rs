//! Incremental scan operator (spec.md §4.4 "Scan(collectionId, pushedWhere?,
//! orderBy?, limit?)").
//!
//! The entry point of a compiled query's operator DAG: subscribes to a
//! source collection's change batches, applies the pushed-down predicate
//! (if any — an unpushable WHERE stays as a later `FilterOperator` stage
//! instead), and when ordering+limit were pushed down too, maintains the
//! bounded sorted window directly rather than forwarding every row
//! downstream.

use super::filter::RowPredicate;
use super::order_limit::{OrderLimitOperator, RowComparator};
use rivet_core::{Change, ChangeKind, Row};

pub struct ScanOperator {
    pushed_where: Option<RowPredicate>,
    window: Option<OrderLimitOperator>,
}

impl ScanOperator {
    pub fn new(pushed_where: Option<RowPredicate>) -> Self {
        ScanOperator { pushed_where, window: None }
    }

    pub fn with_window(mut self, compare: RowComparator, offset: usize, limit: Option<usize>) -> Self {
        self.window = Some(OrderLimitOperator::new(compare, offset, limit));
        self
    }

    fn passes(&self, row: &Row) -> bool {
        self.pushed_where.as_ref().map(|p| p(row)).unwrap_or(true)
    }

    pub fn apply(&mut self, batch: &[Change<Row>]) -> Vec<Change<Row>> {
        let mut filtered = Vec::with_capacity(batch.len());
        for change in batch {
            match change.kind {
                ChangeKind::Insert | ChangeKind::Delete => {
                    if self.passes(&change.value) {
                        filtered.push(change.clone());
                    }
                }
                ChangeKind::Update => {
                    let previous = change.previous_value.as_ref().expect("update always carries previous_value");
                    let was_in = self.passes(previous);
                    let is_in = self.passes(&change.value);
                    match (was_in, is_in) {
                        (false, true) => filtered.push(Change::insert(change.key.clone(), change.value.clone())),
                        (true, false) => filtered.push(Change::delete(change.key.clone(), previous.clone())),
                        (true, true) => filtered.push(change.clone()),
                        (false, false) => {}
                    }
                }
            }
        }

        match &mut self.window {
            Some(window) => window.apply(&filtered),
            None => filtered,
        }
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

    #[test]
    fn pushed_where_filters_inserts() {
        let pred: RowPredicate = Rc::new(|r: &Row| r.get("age").and_then(Value::as_int).unwrap_or(0) > 18);
        let mut op = ScanOperator::new(Some(pred));
        let out = op.apply(&[Change::insert(Key::Int(1), row(30)), Change::insert(Key::Int(2), row(10))]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn no_pushed_where_passes_everything_through() {
        let mut op = ScanOperator::new(None);
        let out = op.apply(&[Change::insert(Key::Int(1), row(5))]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn pushed_window_bounds_output() {
        let pred = None;
        let compare: RowComparator = Rc::new(|a: &Row, b: &Row| a.get("age").cmp(&b.get("age")));
        let mut op = ScanOperator::new(pred).with_window(compare, 0, Some(1));
        let out = op.apply(&[Change::insert(Key::Int(1), row(30)), Change::insert(Key::Int(2), row(10))]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value.get("age"), Some(&Value::Int(10)));
    }
}
