//! Incremental filter operator (spec.md §4.4 "Filter(pred)").
//!
//! Stateless for inserts/deletes, but an update can change whether a row
//! satisfies the predicate — the operator re-evaluates both sides of an
//! update and translates the three possible outcomes (`enter`, `leave`,
//! `stay`) into the right output change.

use rivet_core::{Change, ChangeKind, Row};
use std::rc::Rc;

/// A predicate over a row, shared across clones of a compiled plan.
pub type RowPredicate = Rc<dyn Fn(&Row) -> bool>;

/// Passes change batches through a predicate, re-deriving enter/leave/stay
/// for updates rather than forwarding them unconditionally.
pub struct FilterOperator {
    predicate: RowPredicate,
}

impl FilterOperator {
    pub fn new(predicate: RowPredicate) -> Self {
        FilterOperator { predicate }
    }

    /// Applies the predicate to one change batch, producing the batch this
    /// filter's downstream should see.
    pub fn apply(&self, batch: &[Change<Row>]) -> Vec<Change<Row>> {
        let mut out = Vec::with_capacity(batch.len());
        for change in batch {
            match change.kind {
                ChangeKind::Insert => {
                    if (self.predicate)(&change.value) {
                        out.push(change.clone());
                    }
                }
                ChangeKind::Delete => {
                    if (self.predicate)(&change.value) {
                        out.push(change.clone());
                    }
                }
                ChangeKind::Update => {
                    let previous = change.previous_value.as_ref().expect("update always carries previous_value");
                    let was_in = (self.predicate)(previous);
                    let is_in = (self.predicate)(&change.value);
                    match (was_in, is_in) {
                        (false, true) => out.push(Change::insert(change.key.clone(), change.value.clone())),
                        (true, false) => out.push(Change::delete(change.key.clone(), previous.clone())),
                        (true, true) => out.push(change.clone()),
                        (false, false) => {}
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_core::{Key, Value};

    fn row(active: bool) -> Row {
        Row::from_pairs(vec![("active", Value::Bool(active))])
    }

    fn is_active() -> RowPredicate {
        Rc::new(|r: &Row| r.get("active").and_then(Value::as_bool).unwrap_or(false))
    }

    #[test]
    fn insert_passes_through_only_when_matching() {
        let op = FilterOperator::new(is_active());
        let out = op.apply(&[Change::insert(Key::Int(1), row(true)), Change::insert(Key::Int(2), row(false))]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, Key::Int(1));
    }

    #[test]
    fn update_entering_predicate_becomes_insert() {
        let op = FilterOperator::new(is_active());
        let out = op.apply(&[Change::update(Key::Int(1), row(true), row(false))]);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_insert());
    }

    #[test]
    fn update_leaving_predicate_becomes_delete() {
        let op = FilterOperator::new(is_active());
        let out = op.apply(&[Change::update(Key::Int(1), row(false), row(true))]);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_delete());
    }

    #[test]
    fn update_staying_in_predicate_forwards_as_update() {
        let op = FilterOperator::new(is_active());
        let a = Row::from_pairs(vec![("active", Value::Bool(true)), ("n", Value::Int(1))]);
        let b = Row::from_pairs(vec![("active", Value::Bool(true)), ("n", Value::Int(2))]);
        let out = op.apply(&[Change::update(Key::Int(1), b, a)]);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_update());
    }

    #[test]
    fn update_staying_out_of_predicate_is_dropped() {
        let op = FilterOperator::new(is_active());
        let out = op.apply(&[Change::update(Key::Int(1), row(false), row(false))]);
        assert!(out.is_empty());
    }
}
