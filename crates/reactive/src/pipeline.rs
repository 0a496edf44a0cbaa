//! Wires a [`rivet_query::QueryIr`] into a live operator DAG built from
//! `rivet_incremental`'s operators (spec.md §4.4 C6 "Operator plan").
//!
//! `rivet_query::compiler::compile` only validates a query and compiles
//! its *own*-relation expressions (no alias stripping, no multi-field
//! select shape) — it is deliberately blind to what a join-merged row or a
//! GroupBy/Aggregate output row actually looks like. This module is where
//! that gap is closed: it re-derives per-source and post-join expressions
//! from the raw `QueryIr`, so `rivet-query` stays a pure IR/compiler crate.

use rivet_core::{Change, Key, Row, Value};
use rivet_incremental::{
    AggSpec, DistinctOperator, FilterOperator, FindOneOperator, GroupByAggregateOperator, JoinOperator, JoinType as ExecJoinType,
    OrderLimitOperator, ProjectOperator, RowComparator, RowPredicate, RowSelect, ScanOperator,
};
use rivet_query::{compile_expr, CompiledExpr, Direction, Ir, JoinType as IrJoinType, OperatorRegistry, QueryIr};
use std::cmp::Ordering;
use std::rc::Rc;

/// Rewrites every `Ref` whose leading path segment names one of `aliases`
/// to drop that segment. A single-source query's own refs are plain field
/// names already (no alias prefix), so this is a no-op there; a join
/// query's refs are alias-prefixed, but by the time an expression runs
/// against a per-source row (a join key) or the flattened post-join row
/// (everything else), the alias segment no longer corresponds to an actual
/// field — `default_combine`'s field-wise merge has already flattened it
/// away, so any ambiguity between two sources' same-named field is
/// resolved the same way the merge itself resolves it (right wins).
fn rewrite_any_alias(ir: &Ir, aliases: &[String]) -> Ir {
    match ir {
        Ir::Ref(path) => match path.split_first() {
            Some((head, rest)) if aliases.iter().any(|a| a == head) && !rest.is_empty() => Ir::Ref(rest.to_vec()),
            Some((head, rest)) if aliases.iter().any(|a| a == head) && rest.is_empty() => {
                // A bare `alias` ref with nothing after it has no field to
                // resolve to; leave it as-is, it will just read null.
                Ir::Ref(vec![head.clone()])
            }
            _ => Ir::Ref(path.clone()),
        },
        Ir::Val(v) => Ir::Val(v.clone()),
        Ir::Func { name, args } => Ir::Func { name: name.clone(), args: args.iter().map(|a| rewrite_any_alias(a, aliases)).collect() },
        Ir::Aggregate { name, args } => Ir::Aggregate { name: name.clone(), args: args.iter().map(|a| rewrite_any_alias(a, aliases)).collect() },
        Ir::CollectionRef { .. } | Ir::QueryRef { .. } => ir.clone(),
    }
}

fn to_predicate(expr: CompiledExpr) -> RowPredicate {
    Rc::new(move |row: &Row| expr(row).is_truthy())
}

fn value_to_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        Value::Null => Row::new(),
        other => {
            let mut row = Row::new();
            row.set("value", other);
            row
        }
    }
}

fn to_row_select(expr: CompiledExpr) -> RowSelect {
    Rc::new(move |row: &Row| value_to_row(expr(row)))
}

fn single_ref_field(ir: &Ir) -> Option<String> {
    match ir {
        Ir::Ref(path) if path.len() == 1 => Some(path[0].clone()),
        _ => None,
    }
}

fn map_join_type(join_type: IrJoinType) -> ExecJoinType {
    match join_type {
        IrJoinType::Inner => ExecJoinType::Inner,
        IrJoinType::Left => ExecJoinType::Left,
        IrJoinType::Right => ExecJoinType::Right,
        IrJoinType::Full => ExecJoinType::Full,
    }
}

/// A GroupBy/Aggregate stage plus whether its group key was implicit (a
/// scalar aggregate with no `group_by` clause at all — spec.md's
/// `count(id) where status = active` shape), in which case the synthetic
/// group column is stripped from every output row before it leaves the
/// stage.
struct GroupStage {
    op: GroupByAggregateOperator,
    group_field: String,
    implicit: bool,
}

const SCALAR_GROUP_FIELD: &str = "__scalar_group__";

impl GroupStage {
    fn apply(&mut self, batch: &[Change<Row>]) -> Vec<Change<Row>> {
        let out = self.op.apply(batch);
        if !self.implicit {
            return out;
        }
        out.into_iter()
            .map(|c| {
                let key = c.key.clone();
                let kind = c.kind;
                let mut value = c.value;
                value.remove(&self.group_field);
                let previous = c.previous_value.map(|mut p| {
                    p.remove(&self.group_field);
                    p
                });
                match kind {
                    rivet_core::ChangeKind::Insert => Change::insert(key, value),
                    rivet_core::ChangeKind::Delete => Change::delete(key, value),
                    rivet_core::ChangeKind::Update => Change::update(key, value, previous.expect("update carries previous_value")),
                }
            })
            .collect()
    }
}

/// Finds the `select` shape a GroupBy/Aggregate query produces: a single
/// `Ir::object([...])` node whose values include at least one `Aggregate`.
/// Anything else (a plain projection, a passthrough `select: None`) isn't
/// a group stage at all and is left to an ordinary `Project`.
fn detect_group_stage(ir: &QueryIr, aliases: &[String], registry: &OperatorRegistry) -> Option<GroupStage> {
    let select = ir.select.as_ref()?;
    let Ir::Func { name, args } = select else { return None };
    if name != "object" {
        return None;
    }
    let has_agg = args.chunks(2).any(|pair| matches!(pair.get(1), Some(Ir::Aggregate { .. })));
    if !has_agg {
        return None;
    }

    let (group_key, group_field, implicit) = match ir.group_by.first() {
        Some(g) => {
            let rewritten = rewrite_any_alias(g, aliases);
            let field = single_ref_field(&rewritten).unwrap_or_else(|| "group".to_string());
            (compile_expr(&rewritten, registry), field, false)
        }
        None => (Rc::new(|_: &Row| Value::Null) as CompiledExpr, SCALAR_GROUP_FIELD.to_string(), true),
    };

    let mut aggs = Vec::new();
    for pair in args.chunks(2) {
        if pair.len() != 2 {
            continue;
        }
        let (key_ir, val_ir) = (&pair[0], &pair[1]);
        let Ir::Val(Value::String(out_name)) = key_ir else { continue };
        if let Ir::Aggregate { name, args: agg_args } = val_ir {
            let field = agg_args.first().and_then(|a| single_ref_field(&rewrite_any_alias(a, aliases)));
            let spec = match name.as_str() {
                "count" => Some(AggSpec::Count),
                "sum" => field.map(AggSpec::Sum),
                "avg" => field.map(AggSpec::Avg),
                "min" => field.map(AggSpec::Min),
                "max" => field.map(AggSpec::Max),
                _ => {
                    log::warn!("rivet-reactive: unknown aggregate {name:?}, column {out_name:?} dropped");
                    None
                }
            };
            if let Some(spec) = spec {
                aggs.push((out_name.clone(), spec));
            }
        }
    }

    Some(GroupStage { op: GroupByAggregateOperator::new(group_key, group_field.clone(), aggs), group_field, implicit })
}

fn build_comparator(order_by: &[rivet_query::OrderByClause], aliases: &[String], registry: &OperatorRegistry) -> RowComparator {
    let compiled: Vec<(CompiledExpr, Direction)> = order_by
        .iter()
        .map(|clause| (compile_expr(&rewrite_any_alias(&clause.expression, aliases), registry), clause.direction))
        .collect();
    Rc::new(move |a: &Row, b: &Row| {
        for (expr, direction) in &compiled {
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
    })
}

fn default_comparator() -> RowComparator {
    Rc::new(|_: &Row, _: &Row| Ordering::Equal)
}

/// The live operator DAG a single compiled query runs: one `Scan` per
/// source relation, a left-deep `Join` chain (if any), then a single
/// linear tail of Filter/GroupBy-Aggregate-or-Project/Distinct/OrderLimit
/// (or FindOne for a `singleResult` query).
pub struct QueryPipeline {
    scans: Vec<ScanOperator>,
    joins: Vec<JoinOperator>,
    post_join_filter: Option<FilterOperator>,
    group: Option<GroupStage>,
    project: Option<ProjectOperator>,
    distinct: Option<DistinctOperator>,
    order_limit: Option<OrderLimitOperator>,
    find_one: Option<FindOneOperator>,
    single_result: bool,
    last_single: Option<Row>,
}

const SINGLE_RESULT_KEY: Key = Key::Int(0);

impl QueryPipeline {
    pub fn source_count(&self) -> usize {
        self.scans.len()
    }

    pub fn build(ir: &QueryIr, registry: &OperatorRegistry) -> QueryPipeline {
        let aliases: Vec<String> = ir.aliases().into_iter().map(|a| a.to_string()).collect();
        let has_join = !ir.joins.is_empty();

        let mut scans = Vec::new();
        if has_join {
            for _ in 0..aliases.len() {
                scans.push(ScanOperator::new(None));
            }
        } else {
            let pred = ir.where_.as_ref().map(|w| to_predicate(compile_expr(w, registry)));
            scans.push(ScanOperator::new(pred));
        }

        let mut joins = Vec::new();
        for j in &ir.joins {
            let left_key = compile_expr(&rewrite_any_alias(&j.left_key, &aliases), registry);
            let right_key = compile_expr(&rewrite_any_alias(&j.right_key, &aliases), registry);
            joins.push(JoinOperator::new(map_join_type(j.join_type), left_key, right_key));
        }

        let post_join_filter = if has_join {
            ir.where_.as_ref().map(|w| FilterOperator::new(to_predicate(compile_expr(&rewrite_any_alias(w, &aliases), registry))))
        } else {
            None
        };

        let group = detect_group_stage(ir, &aliases, registry);
        let project = if group.is_none() {
            ir.select.as_ref().map(|s| ProjectOperator::new(to_row_select(compile_expr(&rewrite_any_alias(s, &aliases), registry))))
        } else {
            None
        };

        let distinct = if ir.distinct { Some(DistinctOperator::new()) } else { None };

        let comparator = if ir.order_by.is_empty() { None } else { Some(build_comparator(&ir.order_by, &aliases, registry)) };

        let (find_one, order_limit) = if ir.single_result {
            (Some(FindOneOperator::new(comparator.unwrap_or_else(default_comparator))), None)
        } else if comparator.is_some() || ir.limit.is_some() || ir.offset.is_some() {
            (None, Some(OrderLimitOperator::new(comparator.unwrap_or_else(default_comparator), ir.offset.unwrap_or(0), ir.limit)))
        } else {
            (None, None)
        };

        QueryPipeline {
            scans,
            joins,
            post_join_filter,
            group,
            project,
            distinct,
            order_limit,
            find_one,
            single_result: ir.single_result,
            last_single: None,
        }
    }

    /// Feeds a change batch from source `source_index` through the whole
    /// pipeline, returning the changes this query's sink should apply.
    pub fn process(&mut self, source_index: usize, batch: &[Change<Row>]) -> Vec<Change<Row>> {
        let scanned = self.scans[source_index].apply(batch);
        let combined = self.propagate_through_joins(source_index, scanned);

        let filtered = match &self.post_join_filter {
            Some(f) => f.apply(&combined),
            None => combined,
        };

        let reshaped = match (&mut self.group, &self.project) {
            (Some(g), _) => g.apply(&filtered),
            (None, Some(p)) => p.apply(&filtered),
            (None, None) => filtered,
        };

        let deduped = match &mut self.distinct {
            Some(d) => d.apply(&reshaped),
            None => reshaped,
        };

        if self.single_result {
            let current = self.find_one.as_mut().expect("single_result pipelines always build a find_one stage").apply(&deduped);
            self.diff_single(current)
        } else if let Some(ol) = &mut self.order_limit {
            ol.apply(&deduped)
        } else {
            deduped
        }
    }

    fn propagate_through_joins(&mut self, source_index: usize, delta: Vec<Change<Row>>) -> Vec<Change<Row>> {
        if self.joins.is_empty() {
            return delta;
        }
        let (mut cur, start) = if source_index == 0 {
            (self.joins[0].apply_left(&delta), 1)
        } else {
            (self.joins[source_index - 1].apply_right(&delta), source_index)
        };
        for j in start..self.joins.len() {
            cur = self.joins[j].apply_left(&cur);
        }
        cur
    }

    fn diff_single(&mut self, current: Option<Row>) -> Vec<Change<Row>> {
        match (self.last_single.take(), current) {
            (None, None) => Vec::new(),
            (None, Some(row)) => {
                self.last_single = Some(row.clone());
                vec![Change::insert(SINGLE_RESULT_KEY, row)]
            }
            (Some(old), None) => vec![Change::delete(SINGLE_RESULT_KEY, old)],
            (Some(old), Some(new)) if old == new => {
                self.last_single = Some(old);
                Vec::new()
            }
            (Some(old), Some(new)) => {
                self.last_single = Some(new.clone());
                vec![Change::update(SINGLE_RESULT_KEY, new, old)]
            }
        }
    }
}
