//! Expression evaluation and the fixed operator registry (spec.md §6
//! "Operator name registry"). The incremental executor (`rivet-incremental`)
//! never evaluates `Ir` directly — the compiler lowers every non-pushed-down
//! expression into a `Rc<dyn Fn(&Row) -> Value>` closure via [`compile_expr`]
//! before handing it to an operator.

use crate::ir::Ir;
use rivet_core::{Row, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// A compiled, row-evaluable expression.
pub type CompiledExpr = Rc<dyn Fn(&Row) -> Value>;

/// A registered custom operator (spec.md §6 "Custom operators may be
/// registered").
pub type EvaluatorFactory = Rc<dyn Fn(Vec<CompiledExpr>) -> CompiledExpr>;

/// Holds custom operator registrations alongside the fixed builtin set.
/// Builtins are matched before consulting the registry, so a registration
/// can't shadow a builtin name.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    custom: HashMap<String, EvaluatorFactory>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        OperatorRegistry { custom: HashMap::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, factory: EvaluatorFactory) {
        self.custom.insert(name.into(), factory);
    }

    pub fn get(&self, name: &str) -> Option<&EvaluatorFactory> {
        self.custom.get(name)
    }
}

/// Resolves a `Ref` path against a row. The first segment is looked up as
/// a field; remaining segments navigate into nested `Value::Object`s. A
/// path that doesn't resolve yields `Value::Null` (spec.md's Ref contract
/// doesn't distinguish "dangling at runtime" from "null" — validation at
/// compile time is what catches genuinely unknown aliases, see
/// `crate::compiler::validate`).
pub fn resolve_ref(row: &Row, path: &[String]) -> Value {
    let Some((head, rest)) = path.split_first() else { return Value::Null };
    let mut current = match row.get(head) {
        Some(v) => v.clone(),
        None => return Value::Null,
    };
    for segment in rest {
        current = match current.as_object().and_then(|o| o.get(segment)) {
            Some(v) => v.clone(),
            None => return Value::Null,
        };
    }
    current
}

/// Compiles an `Ir` expression tree (no `Aggregate` nodes — those are
/// handled by the GroupBy/Aggregate operator, never evaluated per-row) into
/// a closure an operator can call per row.
pub fn compile_expr(ir: &Ir, registry: &OperatorRegistry) -> CompiledExpr {
    match ir {
        Ir::Ref(path) => {
            let path = path.clone();
            Rc::new(move |row: &Row| resolve_ref(row, &path))
        }
        Ir::Val(v) => {
            let v = v.clone();
            Rc::new(move |_row: &Row| v.clone())
        }
        Ir::Func { name, args } => {
            let compiled_args: Vec<CompiledExpr> = args.iter().map(|a| compile_expr(a, registry)).collect();
            if let Some(builtin) = builtin_evaluator(name, compiled_args.clone()) {
                return builtin;
            }
            match registry.get(name) {
                Some(factory) => factory(compiled_args),
                None => {
                    log::warn!("rivet-query: unknown operator {name:?}, evaluates to null");
                    Rc::new(|_row: &Row| Value::Null)
                }
            }
        }
        Ir::Aggregate { name, .. } => {
            log::warn!("rivet-query: aggregate {name:?} evaluated per-row outside a GroupBy context; yields null");
            Rc::new(|_row: &Row| Value::Null)
        }
        Ir::CollectionRef { .. } | Ir::QueryRef { .. } => Rc::new(|_row: &Row| Value::Null),
    }
}

fn arg(args: &[CompiledExpr], i: usize) -> CompiledExpr {
    args[i].clone()
}

fn builtin_evaluator(name: &str, args: Vec<CompiledExpr>) -> Option<CompiledExpr> {
    macro_rules! cmp {
        ($op:tt) => {{
            let (a, b) = (arg(&args, 0), arg(&args, 1));
            Some(Rc::new(move |row: &Row| Value::Bool(a(row) $op b(row))) as CompiledExpr)
        }};
    }
    match name {
        "eq" => cmp!(==),
        "gt" => cmp!(>),
        "gte" => cmp!(>=),
        "lt" => cmp!(<),
        "lte" => cmp!(<=),
        "and" => {
            Some(Rc::new(move |row: &Row| Value::Bool(args.iter().all(|a| a(row).is_truthy()))))
        }
        "or" => {
            Some(Rc::new(move |row: &Row| Value::Bool(args.iter().any(|a| a(row).is_truthy()))))
        }
        "not" => {
            let a = arg(&args, 0);
            Some(Rc::new(move |row: &Row| Value::Bool(!a(row).is_truthy())))
        }
        "isNull" => {
            let a = arg(&args, 0);
            Some(Rc::new(move |row: &Row| Value::Bool(a(row).is_null())))
        }
        "isNotNull" => {
            let a = arg(&args, 0);
            Some(Rc::new(move |row: &Row| Value::Bool(!a(row).is_null())))
        }
        // Rows carry no distinction between "missing" and "undefined"
        // beyond spec.md §3's null-vs-missing split; Ref resolution already
        // collapses a missing field to `Value::Null`, so `isUndefined`
        // mirrors `isNull` at the evaluator.
        "isUndefined" => {
            let a = arg(&args, 0);
            Some(Rc::new(move |row: &Row| Value::Bool(a(row).is_null())))
        }
        "isNotUndefined" => {
            let a = arg(&args, 0);
            Some(Rc::new(move |row: &Row| Value::Bool(!a(row).is_null())))
        }
        "like" => {
            let (a, b) = (arg(&args, 0), arg(&args, 1));
            Some(Rc::new(move |row: &Row| Value::Bool(like_match(&a(row), &b(row), false))))
        }
        "ilike" => {
            let (a, b) = (arg(&args, 0), arg(&args, 1));
            Some(Rc::new(move |row: &Row| Value::Bool(like_match(&a(row), &b(row), true))))
        }
        "upper" => {
            let a = arg(&args, 0);
            Some(Rc::new(move |row: &Row| string_map(&a(row), |s| s.to_uppercase())))
        }
        "lower" => {
            let a = arg(&args, 0);
            Some(Rc::new(move |row: &Row| string_map(&a(row), |s| s.to_lowercase())))
        }
        "length" => {
            let a = arg(&args, 0);
            Some(Rc::new(move |row: &Row| match a(row) {
                Value::String(s) => Value::Int(s.chars().count() as i64),
                Value::Array(v) => Value::Int(v.len() as i64),
                _ => Value::Null,
            }))
        }
        "concat" => Some(Rc::new(move |row: &Row| {
            let mut out = String::new();
            for a in &args {
                match a(row) {
                    Value::String(s) => out.push_str(&s),
                    Value::Null => {}
                    other => out.push_str(&other.to_string()),
                }
            }
            Value::String(out)
        })),
        "startsWith" => {
            let (a, b) = (arg(&args, 0), arg(&args, 1));
            Some(Rc::new(move |row: &Row| match (a(row), b(row)) {
                (Value::String(s), Value::String(prefix)) => Value::Bool(s.starts_with(&prefix)),
                _ => Value::Bool(false),
            }))
        }
        "endsWith" => {
            let (a, b) = (arg(&args, 0), arg(&args, 1));
            Some(Rc::new(move |row: &Row| match (a(row), b(row)) {
                (Value::String(s), Value::String(suffix)) => Value::Bool(s.ends_with(&suffix)),
                _ => Value::Bool(false),
            }))
        }
        "add" => numeric_binop(args, |a, b| a + b),
        "subtract" => numeric_binop(args, |a, b| a - b),
        "multiply" => numeric_binop(args, |a, b| a * b),
        "divide" => numeric_binop(args, |a, b| a / b),
        "abs" => numeric_unop(args, f64::abs),
        "round" => numeric_unop(args, |v| v.round()),
        "floor" => numeric_unop(args, f64::floor),
        "ceil" => numeric_unop(args, f64::ceil),
        "in" => {
            let needle = arg(&args, 0);
            let haystack: Vec<CompiledExpr> = args[1..].to_vec();
            Some(Rc::new(move |row: &Row| {
                let n = needle(row);
                Value::Bool(haystack.iter().any(|h| h(row) == n))
            }))
        }
        // A keyed object-construction node built by `Ir::object` — pairs of
        // `Val(String)` name / expression args, evaluated into a
        // `Value::Object`. This is how a projection or a GroupBy/Aggregate
        // select produces more than one named output field.
        "object" => Some(Rc::new(move |row: &Row| {
            let mut map = std::collections::BTreeMap::new();
            for pair in args.chunks(2) {
                if let [name, value] = pair {
                    if let Value::String(key) = name(row) {
                        map.insert(key, value(row));
                    }
                }
            }
            Value::Object(map)
        })),
        "coalesce" => Some(Rc::new(move |row: &Row| {
            for a in &args {
                let v = a(row);
                if !v.is_null() {
                    return v;
                }
            }
            Value::Null
        })),
        _ => None,
    }
}

fn numeric_binop(args: Vec<CompiledExpr>, f: impl Fn(f64, f64) -> f64 + 'static) -> Option<CompiledExpr> {
    let (a, b) = (arg(&args, 0), arg(&args, 1));
    Some(Rc::new(move |row: &Row| match (a(row).as_float(), b(row).as_float()) {
        (Some(x), Some(y)) => Value::Float(f(x, y)),
        _ => Value::Null,
    }))
}

fn numeric_unop(args: Vec<CompiledExpr>, f: impl Fn(f64) -> f64 + 'static) -> Option<CompiledExpr> {
    let a = arg(&args, 0);
    Some(Rc::new(move |row: &Row| match a(row).as_float() {
        Some(x) => Value::Float(f(x)),
        None => Value::Null,
    }))
}

fn string_map(value: &Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(s)),
        other => other.clone(),
    }
}

/// `%`/`_` SQL-style wildcard matching; `ilike` lower-cases both sides
/// first.
fn like_match(value: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Value::String(s), Value::String(p)) = (value, pattern) else { return false };
    let (s, p) = if case_insensitive { (s.to_lowercase(), p.to_lowercase()) } else { (s.clone(), p.clone()) };
    like_glob(&s, &p)
}

fn like_glob(s: &str, pattern: &str) -> bool {
    fn helper(s: &[char], p: &[char]) -> bool {
        match p.first() {
            None => s.is_empty(),
            Some('%') => helper(s, &p[1..]) || (!s.is_empty() && helper(&s[1..], p)),
            Some('_') => !s.is_empty() && helper(&s[1..], &p[1..]),
            Some(c) => s.first() == Some(c) && helper(&s[1..], &p[1..]),
        }
    }
    let s: Vec<char> = s.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    helper(&s, &p)
}
