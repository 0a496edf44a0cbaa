//! Query intermediate representation (spec.md §3 "Query IR node", §4.3 C5).
//!
//! `Ir` is the algebraic expression tree shared by select/where/having/
//! group-by/order-by; `QueryIr` is the top-level shape a [`crate::compiler`]
//! consumes. Functional `fnSelect`/`fnWhere`/`fnHaving` lambda variants from
//! spec.md §4.3 are a binding-layer ergonomics concern (a builder DSL that
//! emits `Ir` directly, spec.md §9 "Dynamic IR from lambdas") — this crate
//! only ever sees the lowered structural form.

use rivet_core::Value;

/// A relation an `Ir` tree can reference: either a base collection or a
/// nested query (subquery), matching spec.md's `CollectionRef`/`QueryRef`.
#[derive(Clone, Debug)]
pub enum Source {
    Collection { collection_id: String, alias: String },
    Query { subquery: Box<QueryIr>, alias: String },
}

impl Source {
    pub fn alias(&self) -> &str {
        match self {
            Source::Collection { alias, .. } => alias,
            Source::Query { alias, .. } => alias,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

/// One `join` clause of a `QueryIr`. `left_key`/`right_key` are the
/// equi-join key expressions evaluated against the accumulated left-hand
/// relation (the query's `from` plus any earlier joins) and `source`
/// respectively — spec.md §4.4's `Join(type, leftKey, rightKey)` operator
/// in IR form.
#[derive(Clone, Debug)]
pub struct Join {
    pub source: Source,
    pub join_type: JoinType,
    pub left_key: Ir,
    pub right_key: Ir,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Debug)]
pub struct OrderByClause {
    pub expression: Ir,
    pub direction: Direction,
}

/// An expression node. `Ref` addresses a field path into a (possibly
/// join-merged) row; the first path segment is treated as a source alias
/// when the owning query has more than one input relation, and as a plain
/// field name otherwise (see `crate::compiler::resolve_ref`).
#[derive(Clone, Debug)]
pub enum Ir {
    Ref(Vec<String>),
    Val(Value),
    Func { name: String, args: Vec<Ir> },
    Aggregate { name: String, args: Vec<Ir> },
    CollectionRef { collection_id: String, alias: String },
    QueryRef { subquery: Box<QueryIr>, alias: String },
}

impl Ir {
    pub fn field(name: impl Into<String>) -> Ir {
        Ir::Ref(vec![name.into()])
    }

    pub fn path(parts: &[&str]) -> Ir {
        Ir::Ref(parts.iter().map(|p| p.to_string()).collect())
    }

    pub fn val(value: impl Into<Value>) -> Ir {
        Ir::Val(value.into())
    }

    pub fn func(name: impl Into<String>, args: Vec<Ir>) -> Ir {
        Ir::Func { name: name.into(), args }
    }

    pub fn agg(name: impl Into<String>, args: Vec<Ir>) -> Ir {
        Ir::Aggregate { name: name.into(), args }
    }

    /// A keyed object-construction expression: `{name: expr, ...}`. Used as
    /// the canonical `select` shape for any query whose projection has to
    /// produce more than one named output field (group-by/aggregate
    /// results, explicit field renaming), represented as a `Func` node so
    /// it needs no dedicated IR variant.
    pub fn object(pairs: Vec<(&str, Ir)>) -> Ir {
        let mut args = Vec::with_capacity(pairs.len() * 2);
        for (name, expr) in pairs {
            args.push(Ir::Val(Value::String(name.to_string())));
            args.push(expr);
        }
        Ir::Func { name: "object".to_string(), args }
    }

    /// Every `Ref` path transitively reachable from this expression, used
    /// by the compiler's validation pass.
    pub fn refs(&self) -> Vec<&[String]> {
        match self {
            Ir::Ref(path) => vec![path.as_slice()],
            Ir::Val(_) | Ir::CollectionRef { .. } | Ir::QueryRef { .. } => Vec::new(),
            Ir::Func { args, .. } | Ir::Aggregate { args, .. } => {
                args.iter().flat_map(Ir::refs).collect()
            }
        }
    }
}

/// The top-level query shape (spec.md §3 `QueryIR`). `from` is the base
/// relation; `join` chains additional relations onto it in order.
#[derive(Clone, Debug)]
pub struct QueryIr {
    pub from: Source,
    pub joins: Vec<Join>,
    /// Projection expression; `None` means "pass the (possibly joined) row
    /// through unchanged".
    pub select: Option<Ir>,
    pub where_: Option<Ir>,
    pub having: Option<Ir>,
    pub group_by: Vec<Ir>,
    pub order_by: Vec<OrderByClause>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub distinct: bool,
    pub single_result: bool,
}

impl QueryIr {
    pub fn from(source: Source) -> QueryIr {
        QueryIr {
            from: source,
            joins: Vec::new(),
            select: None,
            where_: None,
            having: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            single_result: false,
        }
    }

    pub fn collection(collection_id: impl Into<String>, alias: impl Into<String>) -> QueryIr {
        QueryIr::from(Source::Collection { collection_id: collection_id.into(), alias: alias.into() })
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn filter(mut self, predicate: Ir) -> Self {
        self.where_ = Some(match self.where_ {
            Some(existing) => Ir::func("and", vec![existing, predicate]),
            None => predicate,
        });
        self
    }

    pub fn select(mut self, expr: Ir) -> Self {
        self.select = Some(expr);
        self
    }

    pub fn order_by(mut self, expression: Ir, direction: Direction) -> Self {
        self.order_by.push(OrderByClause { expression, direction });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn group_by(mut self, expr: Ir) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn having(mut self, predicate: Ir) -> Self {
        self.having = Some(match self.having {
            Some(existing) => Ir::func("and", vec![existing, predicate]),
            None => predicate,
        });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn find_one(mut self) -> Self {
        self.single_result = true;
        self.limit = Some(1);
        self
    }

    /// Every alias introduced by `from` and `joins`, in order.
    pub fn aliases(&self) -> Vec<&str> {
        let mut out = vec![self.from.alias()];
        out.extend(self.joins.iter().map(|j| j.source.alias()));
        out
    }

    /// Collection ids this query (and any subqueries) directly or
    /// transitively reads from, for dependency-cycle detection (spec.md §9
    /// "Cyclic data").
    pub fn referenced_collection_ids(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_collection_ids(&self.from, &mut out);
        for j in &self.joins {
            collect_collection_ids(&j.source, &mut out);
        }
        out
    }
}

fn collect_collection_ids(source: &Source, out: &mut Vec<String>) {
    match source {
        Source::Collection { collection_id, .. } => out.push(collection_id.clone()),
        Source::Query { subquery, .. } => out.extend(subquery.referenced_collection_ids()),
    }
}
