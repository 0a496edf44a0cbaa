//! Incremental GroupBy + Aggregate operator (spec.md §4.4 "GroupBy(keyExprs)
//! + Aggregate(aggs)").
//!
//! Each group tracks its member rows (needed to service a MIN/MAX
//! recompute after the current extreme is deleted) plus one state machine
//! per requested aggregate. A group's output row is only re-emitted when it
//! actually changes under value equality — this is the "count query
//! no-rerender" invariant: an unrelated field update inside the group must
//! not cause the aggregate row to be re-sent.

use super::aggregate::{IncrementalAvg, IncrementalCount, IncrementalMax, IncrementalMin, IncrementalSum};
use rivet_core::{Change, ChangeKind, Key, Row, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// One requested aggregate: an output field name plus which computation to
/// run over which source field (`Count` ignores its field).
#[derive(Clone, Debug)]
pub enum AggSpec {
    Count,
    Sum(String),
    Avg(String),
    Min(String),
    Max(String),
}

enum AggState {
    Count(IncrementalCount),
    Sum(IncrementalSum),
    Avg(IncrementalAvg),
    Min(IncrementalMin),
    Max(IncrementalMax),
}

impl AggState {
    fn new(spec: &AggSpec) -> Self {
        match spec {
            AggSpec::Count => AggState::Count(IncrementalCount::new()),
            AggSpec::Sum(f) => AggState::Sum(IncrementalSum::new(f.clone())),
            AggSpec::Avg(f) => AggState::Avg(IncrementalAvg::new(f.clone())),
            AggSpec::Min(f) => AggState::Min(IncrementalMin::new(f.clone())),
            AggSpec::Max(f) => AggState::Max(IncrementalMax::new(f.clone())),
        }
    }

    fn on_insert(&mut self, row: &Row) {
        let delta = [crate::delta::Delta::insert(row.clone())];
        match self {
            AggState::Count(c) => c.apply(&delta),
            AggState::Sum(s) => s.apply(&delta),
            AggState::Avg(a) => a.apply(&delta),
            AggState::Min(m) => m.apply(&delta),
            AggState::Max(m) => m.apply(&delta),
        }
    }

    fn on_delete(&mut self, row: &Row) {
        let delta = [crate::delta::Delta::delete(row.clone())];
        match self {
            AggState::Count(c) => c.apply(&delta),
            AggState::Sum(s) => s.apply(&delta),
            AggState::Avg(a) => a.apply(&delta),
            AggState::Min(m) => m.apply(&delta),
            AggState::Max(m) => m.apply(&delta),
        }
    }

    fn needs_recompute(&self) -> bool {
        match self {
            AggState::Min(m) => m.needs_recompute(),
            AggState::Max(m) => m.needs_recompute(),
            _ => false,
        }
    }

    fn value(&self) -> Value {
        match self {
            AggState::Count(c) => Value::Int(c.get()),
            AggState::Sum(s) => Value::Float(s.get()),
            AggState::Avg(a) => a.get().map(Value::Float).unwrap_or(Value::Null),
            AggState::Min(m) => m.get().cloned().unwrap_or(Value::Null),
            AggState::Max(m) => m.get().cloned().unwrap_or(Value::Null),
        }
    }
}

struct GroupState {
    members: HashMap<Key, Row>,
    aggs: Vec<AggState>,
    last_emitted: Option<Row>,
}

fn build_group(agg_specs: &[(String, AggSpec)]) -> GroupState {
    GroupState {
        members: HashMap::new(),
        aggs: agg_specs.iter().map(|(_, spec)| AggState::new(spec)).collect(),
        last_emitted: None,
    }
}

/// Maintains per-group aggregate state and emits the current aggregate row
/// per group whenever it changes.
pub struct GroupByAggregateOperator {
    group_key: Rc<dyn Fn(&Row) -> Value>,
    group_field: String,
    agg_specs: Vec<(String, AggSpec)>,
    groups: HashMap<Value, GroupState>,
}

impl GroupByAggregateOperator {
    /// `group_field` names the output column the group's key value is
    /// written under; `agg_specs` pairs each output column name with the
    /// aggregate computation that fills it.
    pub fn new(group_key: Rc<dyn Fn(&Row) -> Value>, group_field: impl Into<String>, agg_specs: Vec<(String, AggSpec)>) -> Self {
        GroupByAggregateOperator { group_key, group_field: group_field.into(), agg_specs, groups: HashMap::new() }
    }

    fn output_row(&self, group_value: &Value, group: &GroupState) -> Row {
        let mut row = Row::new();
        row.set(self.group_field.clone(), group_value.clone());
        for ((name, _), agg) in self.agg_specs.iter().zip(group.aggs.iter()) {
            row.set(name.clone(), agg.value());
        }
        row
    }

    fn recompute_needed(&self, group: &mut GroupState) {
        for (i, (_, spec)) in self.agg_specs.iter().enumerate() {
            if group.aggs[i].needs_recompute() {
                let field = match spec {
                    AggSpec::Min(f) | AggSpec::Max(f) => f.clone(),
                    _ => continue,
                };
                let members = &group.members;
                match &mut group.aggs[i] {
                    AggState::Min(m) => m.recompute(members.values().filter_map(|r| r.get(&field).cloned())),
                    AggState::Max(m) => m.recompute(members.values().filter_map(|r| r.get(&field).cloned())),
                    _ => {}
                }
            }
        }
    }

    fn insert_into_group(&mut self, group_value: Value, key: Key, row: Row) {
        let agg_specs = &self.agg_specs;
        let group = self.groups.entry(group_value).or_insert_with(|| build_group(agg_specs));
        group.members.insert(key, row.clone());
        for agg in &mut group.aggs {
            agg.on_insert(&row);
        }
    }

    fn remove_from_group(&mut self, group_value: &Value, key: &Key, row: &Row) {
        if let Some(group) = self.groups.get_mut(group_value) {
            group.members.remove(key);
            for agg in &mut group.aggs {
                agg.on_delete(row);
            }
        }
    }

    pub fn apply(&mut self, batch: &[Change<Row>]) -> Vec<Change<Row>> {
        let mut touched: Vec<Value> = Vec::new();

        for change in batch {
            match change.kind {
                ChangeKind::Insert => {
                    let gv = (self.group_key)(&change.value);
                    self.insert_into_group(gv.clone(), change.key.clone(), change.value.clone());
                    touched.push(gv);
                }
                ChangeKind::Delete => {
                    let gv = (self.group_key)(&change.value);
                    self.remove_from_group(&gv, &change.key, &change.value);
                    touched.push(gv);
                }
                ChangeKind::Update => {
                    let previous = change.previous_value.as_ref().expect("update always carries previous_value");
                    let old_gv = (self.group_key)(previous);
                    let new_gv = (self.group_key)(&change.value);
                    self.remove_from_group(&old_gv, &change.key, previous);
                    self.insert_into_group(new_gv.clone(), change.key.clone(), change.value.clone());
                    touched.push(old_gv);
                    touched.push(new_gv);
                }
            }
        }

        touched.sort_by(value_cmp);
        touched.dedup();

        let mut out = Vec::new();
        for gv in touched {
            let is_empty = self.groups.get(&gv).map(|g| g.members.is_empty()).unwrap_or(true);
            if is_empty {
                if let Some(group) = self.groups.remove(&gv) {
                    if let Some(previous) = group.last_emitted {
                        out.push(Change::delete(Key::hashed(&gv), previous));
                    }
                }
                continue;
            }

            let group = self.groups.get_mut(&gv).expect("checked non-empty above");
            self.recompute_needed(group);
            let current = self.output_row(&gv, group);
            match &group.last_emitted {
                None => {
                    out.push(Change::insert(Key::hashed(&gv), current.clone()));
                    group.last_emitted = Some(current);
                }
                Some(previous) if previous != &current => {
                    out.push(Change::update(Key::hashed(&gv), current.clone(), previous.clone()));
                    group.last_emitted = Some(current);
                }
                Some(_) => {}
            }
        }
        out
    }
}

fn value_cmp(a: &Value, b: &Value) -> std::cmp::Ordering {
    a.cmp(b)
}
