//! Incremental aggregate state machines (spec.md §4.4 "GroupBy + Aggregate").
//!
//! Each aggregate tracks enough state to absorb an insert or delete delta
//! in O(1) without rescanning the group. `sum`/`avg` need more than a plain
//! running total to stay convergent under many small updates — see
//! [`CompensatedSum`].

use crate::delta::Delta;
use rivet_core::{Row, Value};

/// Neumaier (improved Kahan) compensated summation.
///
/// A plain running `f64` sum accumulates rounding error with every
/// insert/delete pair; over a long-lived live query that drift can make an
/// aggregate's value wobble even when the underlying group hasn't actually
/// changed, which breaks the no-op-suppression invariant (spec.md §9
/// "Float semantics in aggregates"). This keeps a running compensation term
/// `c` alongside the sum `s` so that `value()` stays accurate to within a
/// couple of ULPs regardless of insertion order.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    pub fn new() -> Self {
        CompensatedSum::default()
    }

    pub fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.compensation += (self.sum - t) + x;
        } else {
            self.compensation += (x - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }

    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.compensation = 0.0;
    }
}

/// Extracts a number from a `Value` for aggregation purposes. Non-numeric
/// values (including missing fields) contribute 0 — the compiler is
/// responsible for rejecting aggregate expressions over non-numeric fields
/// before an operator ever sees them.
fn extract_numeric(value: &Value) -> f64 {
    match value {
        Value::Int(v) => *v as f64,
        Value::Float(v) => *v,
        _ => 0.0,
    }
}

fn field_value<'a>(row: &'a Row, field: &str) -> Option<&'a Value> {
    row.get(field)
}

/// Incremental COUNT aggregate. Generic over the delta payload since a
/// count doesn't need to inspect the row at all.
#[derive(Clone, Debug, Default)]
pub struct IncrementalCount {
    count: i64,
}

impl IncrementalCount {
    pub fn new() -> Self {
        Self { count: 0 }
    }

    pub fn with_initial(count: i64) -> Self {
        Self { count }
    }

    pub fn apply<T>(&mut self, deltas: &[Delta<T>]) {
        for d in deltas {
            self.count += d.diff as i64;
        }
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Incremental SUM aggregate over a named row field.
#[derive(Clone, Debug)]
pub struct IncrementalSum {
    sum: CompensatedSum,
    field: String,
}

impl IncrementalSum {
    pub fn new(field: impl Into<String>) -> Self {
        Self { sum: CompensatedSum::new(), field: field.into() }
    }

    pub fn apply(&mut self, deltas: &[Delta<Row>]) {
        for d in deltas {
            if let Some(value) = field_value(&d.data, &self.field) {
                self.sum.add(extract_numeric(value) * d.diff as f64);
            }
        }
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.sum.value()
    }

    pub fn reset(&mut self) {
        self.sum.reset();
    }
}

/// Incremental AVG aggregate over a named row field (sum + count).
#[derive(Clone, Debug)]
pub struct IncrementalAvg {
    sum: CompensatedSum,
    count: i64,
    field: String,
}

impl IncrementalAvg {
    pub fn new(field: impl Into<String>) -> Self {
        Self { sum: CompensatedSum::new(), count: 0, field: field.into() }
    }

    pub fn apply(&mut self, deltas: &[Delta<Row>]) {
        for d in deltas {
            if let Some(value) = field_value(&d.data, &self.field) {
                self.sum.add(extract_numeric(value) * d.diff as f64);
                self.count += d.diff as i64;
            }
        }
    }

    pub fn get(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum.value() / self.count as f64)
        }
    }

    #[inline]
    pub fn count(&self) -> i64 {
        self.count
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum.value()
    }

    pub fn reset(&mut self) {
        self.sum.reset();
        self.count = 0;
    }
}

/// Incremental MIN aggregate over a named row field.
///
/// MIN is not fully incrementalizable under deletion: removing the current
/// minimum gives no way to find the next-smallest value without a rescan.
/// This tracks the current minimum and a `needs_recompute` flag that the
/// caller (the owning `GroupByAggregate` operator, which keeps the group's
/// member rows around) must service via [`IncrementalMin::recompute`].
#[derive(Clone, Debug)]
pub struct IncrementalMin {
    min: Option<Value>,
    field: String,
    needs_recompute: bool,
}

impl IncrementalMin {
    pub fn new(field: impl Into<String>) -> Self {
        Self { min: None, field: field.into(), needs_recompute: false }
    }

    pub fn apply(&mut self, deltas: &[Delta<Row>]) {
        for d in deltas {
            if let Some(value) = field_value(&d.data, &self.field) {
                if d.is_insert() {
                    match &self.min {
                        None => self.min = Some(value.clone()),
                        Some(current) if value < current => self.min = Some(value.clone()),
                        _ => {}
                    }
                } else if d.is_delete() && self.min.as_ref() == Some(value) {
                    self.needs_recompute = true;
                }
            }
        }
    }

    pub fn get(&self) -> Option<&Value> {
        if self.needs_recompute {
            None
        } else {
            self.min.as_ref()
        }
    }

    pub fn needs_recompute(&self) -> bool {
        self.needs_recompute
    }

    /// Rebuilds the minimum from a full scan of the group's current values.
    pub fn recompute(&mut self, values: impl Iterator<Item = Value>) {
        self.min = values.min();
        self.needs_recompute = false;
    }

    pub fn reset(&mut self) {
        self.min = None;
        self.needs_recompute = false;
    }
}

/// Incremental MAX aggregate over a named row field; see [`IncrementalMin`]
/// for the needs-recompute rationale.
#[derive(Clone, Debug)]
pub struct IncrementalMax {
    max: Option<Value>,
    field: String,
    needs_recompute: bool,
}

impl IncrementalMax {
    pub fn new(field: impl Into<String>) -> Self {
        Self { max: None, field: field.into(), needs_recompute: false }
    }

    pub fn apply(&mut self, deltas: &[Delta<Row>]) {
        for d in deltas {
            if let Some(value) = field_value(&d.data, &self.field) {
                if d.is_insert() {
                    match &self.max {
                        None => self.max = Some(value.clone()),
                        Some(current) if value > current => self.max = Some(value.clone()),
                        _ => {}
                    }
                } else if d.is_delete() && self.max.as_ref() == Some(value) {
                    self.needs_recompute = true;
                }
            }
        }
    }

    pub fn get(&self) -> Option<&Value> {
        if self.needs_recompute {
            None
        } else {
            self.max.as_ref()
        }
    }

    pub fn needs_recompute(&self) -> bool {
        self.needs_recompute
    }

    pub fn recompute(&mut self, values: impl Iterator<Item = Value>) {
        self.max = values.max();
        self.needs_recompute = false;
    }

    pub fn reset(&mut self) {
        self.max = None;
        self.needs_recompute = false;
    }
}
