//! One-shot query execution: the consumer of `rivet_query::compile`'s
//! `CompiledQuery` (spec.md §4.3 C5/C6 "Query compiler").
//!
//! `rivet_reactive::QueryPipeline` maintains a query's result incrementally
//! as a live, subscribable collection — the right tool when a caller wants
//! to stay subscribed. Sometimes a caller just wants the current answer
//! once (a one-off `find`/`findOne`, a server-side prefetch populating a
//! [`crate::binding::DehydratedState`]) without paying for a standing
//! live-query subscription; this module runs a compiled query directly
//! against a snapshot of its single input collection instead.
//!
//! Limited to non-joined queries: `rivet_query::compiler::push_down` itself
//! only ever pushes down against an un-joined base collection, and there is
//! no non-incremental join evaluator in this workspace — joined queries
//! always go through `rivet_reactive::QueryPipeline`.

use crate::registry::Registry;
use rivet_core::{Error, Result, Row, Value};
use rivet_query::{compile, CompiledQuery, Direction, QueryIr, Source};
use std::cmp::Ordering;

impl Registry {
    /// Runs `ir` once against the collection or live query it names and
    /// returns the matching rows in final (filtered/ordered/limited) order.
    pub fn query_once(&self, ir: &QueryIr) -> Result<Vec<Row>> {
        if !ir.joins.is_empty() {
            return Err(Error::invalid_query("query_once does not support joins; use a live query instead"));
        }
        let Source::Collection { collection_id, .. } = &ir.from else {
            return Err(Error::invalid_query("query_once requires a base collection or registered live query as its source"));
        };
        let source = self
            .get(collection_id)
            .ok_or_else(|| Error::invalid_query(format!("query_once: unknown collection '{collection_id}'")))?;

        let compiled = compile(ir.clone(), self.operators(), &|_, _| None)?;
        let rows = source.borrow().values();
        Ok(execute_compiled(&compiled, rows))
    }
}

fn execute_compiled(compiled: &CompiledQuery, rows: Vec<Row>) -> Vec<Row> {
    let mut rows: Vec<Row> = match &compiled.residual_filter {
        Some(filter) => rows.into_iter().filter(|r| (filter)(r).is_truthy()).collect(),
        None => rows,
    };

    if !compiled.order_by.is_empty() {
        rows.sort_by(|a, b| compare_by_clauses(&compiled.order_by, a, b));
    }

    if let Some(offset) = compiled.offset {
        rows = rows.into_iter().skip(offset).collect();
    }
    if let Some(limit) = compiled.limit {
        rows.truncate(limit);
    }

    if compiled.distinct {
        rows = dedup_preserve_order(rows);
    }

    match &compiled.projection {
        Some(project) => rows.iter().map(|r| value_to_row(project(r))).collect(),
        None => rows,
    }
}

fn compare_by_clauses(clauses: &[(rivet_query::CompiledExpr, Direction)], a: &Row, b: &Row) -> Ordering {
    for (expr, direction) in clauses {
        let ordering = expr(a).cmp(&expr(b));
        let ordering = match direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn dedup_preserve_order(rows: Vec<Row>) -> Vec<Row> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter().filter(|r| seen.insert(r.clone())).collect()
}

/// Mirrors `rivet_reactive::pipeline`'s `value_to_row`: a projection's
/// `Ir::object(...)` result is already `Value::Object`, collected directly
/// into a `Row`; anything else becomes a single `"value"` field.
fn value_to_row(value: Value) -> Row {
    match value {
        Value::Object(fields) => fields.into_iter().collect(),
        Value::Null => Row::new(),
        other => Row::from_pairs(vec![("value", other)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use rivet_collection::{Collection, CollectionConfig};
    use rivet_query::Ir;

    fn seeded_registry() -> Registry {
        let mut c = Collection::new("orders", CollectionConfig::with_id_key());
        c.begin();
        c.commit();
        c.mark_ready();
        c.apply_insert(1, Row::from_pairs(vec![("id", Value::Int(1)), ("amount", Value::Int(10))])).unwrap();
        c.apply_insert(1, Row::from_pairs(vec![("id", Value::Int(2)), ("amount", Value::Int(30))])).unwrap();
        c.apply_insert(1, Row::from_pairs(vec![("id", Value::Int(3)), ("amount", Value::Int(20))])).unwrap();

        let mut registry = Registry::new();
        registry.register_collection(std::rc::Rc::new(std::cell::RefCell::new(c))).unwrap();
        registry
    }

    #[test]
    fn filters_and_sorts_without_staying_subscribed() {
        let registry = seeded_registry();
        let ir = QueryIr::collection("orders", "o")
            .filter(Ir::func("gt", vec![Ir::field("amount"), Ir::val(10i64)]))
            .order_by(Ir::field("amount"), Direction::Asc);

        let rows = registry.query_once(&ir).unwrap();
        let amounts: Vec<i64> = rows.iter().map(|r| r.get("amount").and_then(Value::as_int).unwrap()).collect();
        assert_eq!(amounts, vec![20, 30]);
    }

    #[test]
    fn limit_and_offset_apply_after_ordering() {
        let registry = seeded_registry();
        let ir = QueryIr::collection("orders", "o").order_by(Ir::field("amount"), Direction::Desc).limit(1).offset(1);

        let rows = registry.query_once(&ir).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("amount"), Some(&Value::Int(20)));
    }

    #[test]
    fn joins_are_rejected() {
        use rivet_query::{Join, JoinType};
        let registry = seeded_registry();
        let ir = QueryIr::collection("orders", "o").join(Join {
            source: Source::Collection { collection_id: "orders".into(), alias: "o2".into() },
            join_type: JoinType::Inner,
            left_key: Ir::field("id"),
            right_key: Ir::field("id"),
        });
        assert!(registry.query_once(&ir).is_err());
    }
}
