//! Query IR, compiler, expression evaluator and predicate-subset reasoning
//! for rivet (spec.md components C5 "Query compiler", C6 "Operator plan",
//! C10 "Predicate subset/dedup utilities").
//!
//! This crate has no notion of a running collection or live data — it only
//! reasons about `QueryIr` shapes. `rivet-incremental` supplies the
//! operators a `CompiledQuery` is executed against; `rivet-reactive` wires
//! the two together against live collections.

pub mod compiler;
pub mod eval;
pub mod ir;
pub mod predicate;

pub use compiler::{compile, CompiledQuery, PushedDown};
pub use eval::{compile_expr, resolve_ref, CompiledExpr, EvaluatorFactory, OperatorRegistry};
pub use ir::{Direction, Ir, Join, JoinType, OrderByClause, QueryIr, Source};
pub use predicate::{
    is_limit_subset, is_order_by_subset, is_predicate_subset, is_where_subset, minus_where_predicates,
    union_where_predicates, Cmp, WherePredicate,
};
