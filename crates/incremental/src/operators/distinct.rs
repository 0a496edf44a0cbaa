//! Incremental distinct operator (spec.md §4.4 "Distinct").
//!
//! Distinct dedups by row *value*, not by key — two different underlying
//! rows with identical field content collapse to a single downstream row.
//! `Change::key` for a distinct output row is therefore a content-derived
//! key (`Key::hashed`), not either input row's own key.

use rivet_core::{Change, ChangeKind, Key, Row};
use std::collections::HashMap;

#[derive(Default)]
pub struct DistinctOperator {
    multiplicities: HashMap<Row, i64>,
}

impl DistinctOperator {
    pub fn new() -> Self {
        DistinctOperator { multiplicities: HashMap::new() }
    }

    pub fn apply(&mut self, batch: &[Change<Row>]) -> Vec<Change<Row>> {
        let mut out = Vec::new();
        for change in batch {
            match change.kind {
                ChangeKind::Insert => out.extend(self.bump(&change.value, 1)),
                ChangeKind::Delete => out.extend(self.bump(&change.value, -1)),
                ChangeKind::Update => {
                    let previous = change.previous_value.as_ref().expect("update always carries previous_value");
                    if previous != &change.value {
                        out.extend(self.bump(previous, -1));
                        out.extend(self.bump(&change.value, 1));
                    }
                }
            }
        }
        out
    }

    fn bump(&mut self, row: &Row, delta: i64) -> Option<Change<Row>> {
        let before = *self.multiplicities.get(row).unwrap_or(&0);
        let after = before + delta;
        if after == 0 {
            self.multiplicities.remove(row);
        } else {
            self.multiplicities.insert(row.clone(), after);
        }
        match (before, after) {
            (0, 1) => Some(Change::insert(Key::hashed(row), row.clone())),
            (b, 0) if b != 0 => Some(Change::delete(Key::hashed(row), row.clone())),
            _ => None,
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
    fn first_insert_of_a_value_emits_once() {
        let mut op = DistinctOperator::new();
        let out = op.apply(&[Change::insert(Key::Int(1), row(5))]);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_insert());
    }

    #[test]
    fn duplicate_insert_is_suppressed() {
        let mut op = DistinctOperator::new();
        op.apply(&[Change::insert(Key::Int(1), row(5))]);
        let out = op.apply(&[Change::insert(Key::Int(2), row(5))]);
        assert!(out.is_empty(), "second row with the same value must not re-emit");
    }

    #[test]
    fn delete_emits_only_once_multiplicity_drops_to_zero() {
        let mut op = DistinctOperator::new();
        op.apply(&[Change::insert(Key::Int(1), row(5)), Change::insert(Key::Int(2), row(5))]);
        let out = op.apply(&[Change::delete(Key::Int(1), row(5))]);
        assert!(out.is_empty(), "one remaining duplicate still backs the value");

        let out = op.apply(&[Change::delete(Key::Int(2), row(5))]);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_delete());
    }

    #[test]
    fn update_changing_value_retracts_old_and_emits_new() {
        let mut op = DistinctOperator::new();
        op.apply(&[Change::insert(Key::Int(1), row(5))]);
        let out = op.apply(&[Change::update(Key::Int(1), row(6), row(5))]);
        assert_eq!(out.len(), 2);
        assert!(out[0].is_delete());
        assert!(out[1].is_insert());
    }
}
