//! Query compiler (spec.md §4.3 C5/C6): validates a `QueryIr`, pushes
//! predicate/order/limit clauses down onto indexable inputs, picks an
//! index when one covers the pushed clause, and detects cyclic query
//! dependencies (spec.md §9 "Cyclic data").
//!
//! The compiler never touches row data — it only reasons about the IR
//! shape and the indexes a collection happens to expose. Evaluating a
//! `CompiledQuery`'s residual filter/order/limit against live rows is
//! `rivet-incremental`'s job.

use crate::eval::{compile_expr, CompiledExpr, OperatorRegistry};
use crate::ir::{Direction, Ir, OrderByClause, QueryIr, Source};
use rivet_core::{Error, Result};
use rivet_index::{Index, KeyRange};
use std::collections::HashSet;

/// What a compiled query needs from each input relation: a pushed-down
/// equality/range lookup if an index covers part of the WHERE clause, plus
/// whatever's left over to evaluate in the executor.
#[derive(Clone, Debug)]
pub struct PushedDown {
    pub alias: String,
    /// An index-servable range, when the compiler found an index on the
    /// field a leading conjunct constrains.
    pub index_field: Option<String>,
    pub index_range: Option<KeyRange<rivet_core::Value>>,
}

/// The result of compiling a `QueryIr`: the residual work an executor must
/// still perform after any push-down, plus validated metadata.
pub struct CompiledQuery {
    pub ir: QueryIr,
    pub pushed: Vec<PushedDown>,
    /// Predicate left to evaluate row-by-row after index lookups (the whole
    /// WHERE clause if no push-down applied).
    pub residual_filter: Option<CompiledExpr>,
    pub projection: Option<CompiledExpr>,
    pub order_by: Vec<(CompiledExpr, Direction)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub distinct: bool,
    pub single_result: bool,
    /// Collection ids this query transitively reads, including subqueries.
    pub dependencies: Vec<String>,
}

/// Compiles `ir` against a registry of custom operators and, optionally, a
/// lookup from `(collection_id, field)` to a usable index. `index_lookup`
/// returning `Some` means "this field has an index whose `KeyRange` can
/// serve a pushed equality/range clause".
pub fn compile(
    ir: QueryIr,
    registry: &OperatorRegistry,
    index_lookup: &dyn Fn(&str, &str) -> Option<&dyn Index>,
) -> Result<CompiledQuery> {
    validate(&ir)?;
    detect_cycles(&ir)?;

    let dependencies = ir.referenced_collection_ids();

    let pushed = push_down(&ir, index_lookup);

    let residual_filter = ir.where_.as_ref().map(|w| compile_expr(w, registry));
    let projection = ir.select.as_ref().map(|s| compile_expr(s, registry));
    let order_by = ir
        .order_by
        .iter()
        .map(|OrderByClause { expression, direction }| (compile_expr(expression, registry), *direction))
        .collect();

    Ok(CompiledQuery {
        pushed,
        residual_filter,
        projection,
        order_by,
        limit: ir.limit,
        offset: ir.offset,
        distinct: ir.distinct,
        single_result: ir.single_result,
        dependencies,
        ir,
    })
}

/// Validates dangling `Ref`s against known aliases and unknown top-level
/// operators (spec.md's `InvalidQuery` error kind).
fn validate(ir: &QueryIr) -> Result<()> {
    let aliases: HashSet<&str> = ir.aliases().into_iter().collect();
    let multi_source = aliases.len() > 1;

    let mut exprs: Vec<&Ir> = Vec::new();
    exprs.extend(ir.select.iter());
    exprs.extend(ir.where_.iter());
    exprs.extend(ir.having.iter());
    exprs.extend(ir.group_by.iter());
    exprs.extend(ir.order_by.iter().map(|c| &c.expression));
    for j in &ir.joins {
        exprs.push(&j.left_key);
        exprs.push(&j.right_key);
    }

    for expr in exprs {
        for path in expr.refs() {
            let Some((head, _rest)) = path.split_first() else {
                return Err(Error::invalid_query("empty field reference"));
            };
            if multi_source && !aliases.contains(head.as_str()) {
                return Err(Error::invalid_query(format!(
                    "reference {head:?} does not match any joined source alias"
                )));
            }
        }
    }

    if let Source::Query { subquery, .. } = &ir.from {
        validate(subquery)?;
    }
    for j in &ir.joins {
        if let Source::Query { subquery, .. } = &j.source {
            validate(subquery)?;
        }
    }

    Ok(())
}

/// Depth-first cycle check over a single query's own subquery nesting.
/// `QueryIr` subqueries are owned `Box`es, so a cycle can never actually
/// arise within one IR tree built by normal construction — this guards
/// against the degenerate case regardless. The cycle spec.md §9 "Cyclic
/// data" warns about (a live query built from a collection that is itself
/// sourced from that live query) is a cross-query, id-based cycle through
/// the collection registry, and is checked by `rivet`'s `Registry` at query
/// registration time instead, where the full id graph is visible.
fn detect_cycles(ir: &QueryIr) -> Result<()> {
    fn walk(ir: &QueryIr, path: &mut Vec<String>, seen: &mut HashSet<String>) -> Result<()> {
        fn visit_source(source: &Source, path: &mut Vec<String>, seen: &mut HashSet<String>) -> Result<()> {
            match source {
                Source::Collection { .. } => Ok(()),
                Source::Query { subquery, .. } => {
                    let id = format!("{:p}", subquery.as_ref());
                    if path.contains(&id) {
                        return Err(Error::invalid_query("cyclic query dependency detected"));
                    }
                    path.push(id.clone());
                    seen.insert(id);
                    walk(subquery, path, seen)?;
                    path.pop();
                    Ok(())
                }
            }
        }
        visit_source(&ir.from, path, seen)?;
        for j in &ir.joins {
            visit_source(&j.source, path, seen)?;
        }
        Ok(())
    }
    let mut path = Vec::new();
    let mut seen = HashSet::new();
    walk(ir, &mut path, &mut seen)
}

/// Looks at the top-level conjuncts of WHERE and, for each one shaped like
/// `eq(ref(field), val)`/`gt(ref(field), val)`/etc against a single-source
/// query, checks whether that source exposes an index on `field`. Anything
/// not a simple single-field comparison against a base collection's own
/// field is left for the residual filter (spec.md §4.6's "index selection
/// is best-effort, never required for correctness").
fn push_down(ir: &QueryIr, index_lookup: &dyn Fn(&str, &str) -> Option<&dyn Index>) -> Vec<PushedDown> {
    let Source::Collection { collection_id, alias } = &ir.from else {
        return Vec::new();
    };
    if !ir.joins.is_empty() {
        return Vec::new();
    }
    let Some(where_) = &ir.where_ else { return Vec::new() };

    let mut conjuncts = Vec::new();
    flatten_and(where_, &mut conjuncts);

    for clause in &conjuncts {
        if let Some((field, range)) = as_index_clause(clause) {
            if index_lookup(collection_id, &field).is_some() {
                return vec![PushedDown {
                    alias: alias.clone(),
                    index_field: Some(field),
                    index_range: Some(range),
                }];
            }
        }
    }

    vec![PushedDown { alias: alias.clone(), index_field: None, index_range: None }]
}

fn flatten_and<'a>(ir: &'a Ir, out: &mut Vec<&'a Ir>) {
    if let Ir::Func { name, args } = ir {
        if name == "and" {
            for a in args {
                flatten_and(a, out);
            }
            return;
        }
    }
    out.push(ir);
}

fn as_index_clause(ir: &Ir) -> Option<(String, KeyRange<rivet_core::Value>)> {
    let Ir::Func { name, args } = ir else { return None };
    if args.len() != 2 {
        return None;
    }
    let (field, value) = match (&args[0], &args[1]) {
        (Ir::Ref(path), Ir::Val(v)) if path.len() == 1 => (path[0].clone(), v.clone()),
        (Ir::Val(v), Ir::Ref(path)) if path.len() == 1 => (path[0].clone(), v.clone()),
        _ => return None,
    };
    let range = match name.as_str() {
        "eq" => KeyRange::only(value),
        "gt" => KeyRange::lower_bound(value, true),
        "gte" => KeyRange::lower_bound(value, false),
        "lt" => KeyRange::upper_bound(value, true),
        "lte" => KeyRange::upper_bound(value, false),
        _ => return None,
    };
    Some((field, range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Join;
    use crate::ir::JoinType;

    fn no_index(_c: &str, _f: &str) -> Option<&dyn Index> {
        None
    }

    #[test]
    fn validates_known_alias_single_source() {
        let ir = QueryIr::collection("users", "u").filter(Ir::func("gt", vec![Ir::field("age"), Ir::val(30i64)]));
        assert!(validate(&ir).is_ok());
    }

    #[test]
    fn rejects_unknown_alias_reference_in_multi_source_query() {
        let ir = QueryIr::collection("users", "u")
            .join(Join {
                source: Source::Collection { collection_id: "orders".into(), alias: "o".into() },
                join_type: JoinType::Inner,
                left_key: Ir::path(&["u", "id"]),
                right_key: Ir::path(&["o", "user_id"]),
            })
            .filter(Ir::func("gt", vec![Ir::path(&["nope", "age"]), Ir::val(30i64)]));
        let err = validate(&ir).unwrap_err();
        assert_eq!(err.kind(), "InvalidQuery");
    }

    #[test]
    fn nested_subquery_without_cycle_is_fine() {
        let inner = QueryIr::collection("users", "u");
        let outer = QueryIr::from(Source::Query { subquery: Box::new(inner), alias: "sub".into() });
        assert!(detect_cycles(&outer).is_ok());
    }

    #[test]
    fn push_down_finds_eq_clause_for_indexed_field() {
        let ir = QueryIr::collection("users", "u").filter(Ir::func("eq", vec![Ir::field("status"), Ir::val("active")]));
        let pushed = push_down(&ir, &no_index);
        assert_eq!(pushed.len(), 1);
        assert!(pushed[0].index_field.is_none(), "no index registered, falls back to residual filter");
    }

    #[test]
    fn no_push_down_across_joins() {
        let ir = QueryIr::collection("users", "u").join(Join {
            source: Source::Collection { collection_id: "orders".into(), alias: "o".into() },
            join_type: JoinType::Inner,
            left_key: Ir::path(&["u", "id"]),
            right_key: Ir::path(&["o", "user_id"]),
        });
        assert!(push_down(&ir, &no_index).is_empty());
    }
}
