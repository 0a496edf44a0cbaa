//! Incremental project operator (spec.md §4.4 "Project(select)").
//!
//! Projection only reshapes a row's value; it never changes which key a
//! change belongs to. An update whose projected value doesn't change under
//! the select expression must be dropped, not forwarded as a no-op update —
//! that's what lets a `count(id)`-style query stay silent across unrelated
//! field writes (spec.md §9 "count query no-rerender").

use rivet_core::{Change, ChangeKind, Row};
use std::rc::Rc;

/// A row-to-row projection, shared across clones of a compiled plan.
pub type RowSelect = Rc<dyn Fn(&Row) -> Row>;

pub struct ProjectOperator {
    select: RowSelect,
}

impl ProjectOperator {
    pub fn new(select: RowSelect) -> Self {
        ProjectOperator { select }
    }

    pub fn apply(&self, batch: &[Change<Row>]) -> Vec<Change<Row>> {
        let mut out = Vec::with_capacity(batch.len());
        for change in batch {
            match change.kind {
                ChangeKind::Insert => out.push(Change::insert(change.key.clone(), (self.select)(&change.value))),
                ChangeKind::Delete => out.push(Change::delete(change.key.clone(), (self.select)(&change.value))),
                ChangeKind::Update => {
                    let previous = change.previous_value.as_ref().expect("update always carries previous_value");
                    let new_projected = (self.select)(&change.value);
                    let old_projected = (self.select)(previous);
                    if new_projected != old_projected {
                        out.push(Change::update(change.key.clone(), new_projected, old_projected));
                    }
                }
            }
        }
        out
    }
}
