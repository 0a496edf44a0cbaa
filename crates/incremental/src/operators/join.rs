//! Incremental hash join operator (spec.md §4.4 "Join(type, leftKey,
//! rightKey)").
//!
//! Maintains a keyed index on both sides. `left`/`right`/`full` joins must
//! emit a joined row with a null opposite side for an unmatched row, then
//! retract it on the unmatched side's first match and re-emit it once the
//! last matching row on the other side is removed — this file is the part
//! of the executor that implements that retract/re-emit dance.

use rivet_core::{Change, ChangeKind, Key, Row, Value};
use std::collections::HashMap;
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

pub type JoinKeyFn = Rc<dyn Fn(&Row) -> Value>;
pub type JoinCombineFn = Rc<dyn Fn(Option<&Row>, Option<&Row>) -> Row>;

/// Default combiner: merges both sides field-wise when both are present
/// (right's fields win on overlap, matching `Row::merged_with`); a missing
/// side under an outer join contributes only its own fields.
pub fn default_combine() -> JoinCombineFn {
    Rc::new(|left: Option<&Row>, right: Option<&Row>| match (left, right) {
        (Some(l), Some(r)) => l.merged_with(r),
        (Some(l), None) => l.clone(),
        (None, Some(r)) => r.clone(),
        (None, None) => Row::new(),
    })
}

pub struct JoinOperator {
    join_type: JoinType,
    left_key: JoinKeyFn,
    right_key: JoinKeyFn,
    combine: JoinCombineFn,
    left_rows: HashMap<Key, Row>,
    right_rows: HashMap<Key, Row>,
    left_index: HashMap<Value, Vec<Key>>,
    right_index: HashMap<Value, Vec<Key>>,
    unmatched_left: HashSet<Key>,
    unmatched_right: HashSet<Key>,
}

const NULL_RIGHT: &str = "\u{0}right-unmatched";
const NULL_LEFT: &str = "\u{0}left-unmatched";

impl JoinOperator {
    pub fn new(join_type: JoinType, left_key: JoinKeyFn, right_key: JoinKeyFn) -> Self {
        JoinOperator {
            join_type,
            left_key,
            right_key,
            combine: default_combine(),
            left_rows: HashMap::new(),
            right_rows: HashMap::new(),
            left_index: HashMap::new(),
            right_index: HashMap::new(),
            unmatched_left: HashSet::new(),
            unmatched_right: HashSet::new(),
        }
    }

    pub fn with_combine(mut self, combine: JoinCombineFn) -> Self {
        self.combine = combine;
        self
    }

    fn emits_left_unmatched(&self) -> bool {
        matches!(self.join_type, JoinType::Left | JoinType::Full)
    }

    fn emits_right_unmatched(&self) -> bool {
        matches!(self.join_type, JoinType::Right | JoinType::Full)
    }

    fn join_key(&self, left: Option<&Key>, right: Option<&Key>) -> Key {
        match (left, right) {
            (Some(l), Some(r)) => Key::composite(&[l.clone(), r.clone()]),
            (Some(l), None) => Key::composite(&[l.clone(), Key::String(NULL_RIGHT.to_string())]),
            (None, Some(r)) => Key::composite(&[Key::String(NULL_LEFT.to_string()), r.clone()]),
            (None, None) => unreachable!("a joined row always has at least one real side"),
        }
    }

    pub fn apply_left(&mut self, batch: &[Change<Row>]) -> Vec<Change<Row>> {
        let mut out = Vec::new();
        for change in batch {
            match change.kind {
                ChangeKind::Insert => out.extend(self.insert_left(change.key.clone(), change.value.clone())),
                ChangeKind::Delete => out.extend(self.delete_left(&change.key, &change.value)),
                ChangeKind::Update => {
                    out.extend(self.delete_left(&change.key, change.previous_value.as_ref().expect("update carries previous_value")));
                    out.extend(self.insert_left(change.key.clone(), change.value.clone()));
                }
            }
        }
        out
    }

    pub fn apply_right(&mut self, batch: &[Change<Row>]) -> Vec<Change<Row>> {
        let mut out = Vec::new();
        for change in batch {
            match change.kind {
                ChangeKind::Insert => out.extend(self.insert_right(change.key.clone(), change.value.clone())),
                ChangeKind::Delete => out.extend(self.delete_right(&change.key, &change.value)),
                ChangeKind::Update => {
                    out.extend(self.delete_right(&change.key, change.previous_value.as_ref().expect("update carries previous_value")));
                    out.extend(self.insert_right(change.key.clone(), change.value.clone()));
                }
            }
        }
        out
    }

    fn insert_left(&mut self, key: Key, row: Row) -> Vec<Change<Row>> {
        let jv = (self.left_key)(&row);
        let rights = self.right_index.get(&jv).cloned().unwrap_or_default();
        self.left_rows.insert(key.clone(), row.clone());
        self.left_index.entry(jv).or_default().push(key.clone());

        let mut out = Vec::new();
        if rights.is_empty() {
            if self.emits_left_unmatched() {
                out.push(Change::insert(self.join_key(Some(&key), None), (self.combine)(Some(&row), None)));
                self.unmatched_left.insert(key);
            }
        } else {
            for rk in &rights {
                let rrow = self.right_rows.get(rk).expect("right index entry without a row").clone();
                out.push(Change::insert(self.join_key(Some(&key), Some(rk)), (self.combine)(Some(&row), Some(&rrow))));
            }
        }
        out
    }

    fn delete_left(&mut self, key: &Key, row: &Row) -> Vec<Change<Row>> {
        let jv = (self.left_key)(row);
        if let Some(keys) = self.left_index.get_mut(&jv) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.left_index.remove(&jv);
            }
        }
        self.left_rows.remove(key);

        let rights = self.right_index.get(&jv).cloned().unwrap_or_default();
        let mut out = Vec::new();
        if rights.is_empty() {
            if self.emits_left_unmatched() && self.unmatched_left.remove(key) {
                out.push(Change::delete(self.join_key(Some(key), None), (self.combine)(Some(row), None)));
            }
        } else {
            for rk in &rights {
                let rrow = self.right_rows.get(rk).expect("right index entry without a row").clone();
                out.push(Change::delete(self.join_key(Some(key), Some(rk)), (self.combine)(Some(row), Some(&rrow))));
            }
        }
        out
    }

    fn insert_right(&mut self, key: Key, row: Row) -> Vec<Change<Row>> {
        let jv = (self.right_key)(&row);
        let lefts = self.left_index.get(&jv).cloned().unwrap_or_default();
        self.right_rows.insert(key.clone(), row.clone());
        self.right_index.entry(jv).or_default().push(key.clone());

        let mut out = Vec::new();
        if lefts.is_empty() {
            if self.emits_right_unmatched() {
                out.push(Change::insert(self.join_key(None, Some(&key)), (self.combine)(None, Some(&row))));
                self.unmatched_right.insert(key);
            }
        } else {
            for lk in &lefts {
                let lrow = self.left_rows.get(lk).expect("left index entry without a row").clone();
                if self.emits_left_unmatched() && self.unmatched_left.remove(lk) {
                    out.push(Change::delete(self.join_key(Some(lk), None), (self.combine)(Some(&lrow), None)));
                }
                out.push(Change::insert(self.join_key(Some(lk), Some(&key)), (self.combine)(Some(&lrow), Some(&row))));
            }
        }
        out
    }

    fn delete_right(&mut self, key: &Key, row: &Row) -> Vec<Change<Row>> {
        let jv = (self.right_key)(row);
        if let Some(keys) = self.right_index.get_mut(&jv) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.right_index.remove(&jv);
            }
        }
        self.right_rows.remove(key);
        let still_matched = self.right_index.get(&jv).map(|v| !v.is_empty()).unwrap_or(false);

        let lefts = self.left_index.get(&jv).cloned().unwrap_or_default();
        let mut out = Vec::new();
        if lefts.is_empty() {
            if self.emits_right_unmatched() && self.unmatched_right.remove(key) {
                out.push(Change::delete(self.join_key(None, Some(key)), (self.combine)(None, Some(row))));
            }
        } else {
            for lk in &lefts {
                let lrow = self.left_rows.get(lk).expect("left index entry without a row").clone();
                out.push(Change::delete(self.join_key(Some(lk), Some(key)), (self.combine)(Some(&lrow), Some(row))));
                if !still_matched && self.emits_left_unmatched() {
                    out.push(Change::insert(self.join_key(Some(lk), None), (self.combine)(Some(&lrow), None)));
                    self.unmatched_left.insert(lk.clone());
                }
            }
        }
        out
    }
}
