//! Predicate-subset / dedup reasoning (spec.md §4.3 "Push-down & subset
//! analysis", component C10): `isWhereSubset`, `unionWherePredicates`,
//! `minusWherePredicates`, `isOrderBySubset`, `isLimitSubset`,
//! `isPredicateSubset`.
//!
//! `WherePredicate` is a small canonical AST over exactly the comparison
//! set spec.md names as decidable (`eq, gt, gte, lt, lte, in, like, ilike`
//! plus `and/or/not`). Anything the subset algorithm can't represent
//! precisely becomes [`WherePredicate::Unknown`], which never claims a
//! subset relationship it can't prove (spec.md: "otherwise conservatively
//! returns 'unknown' treated as 'not a subset'" — soundness over
//! completeness, see property 7 in spec.md §8).

use crate::ir::{Direction, OrderByClause};
use rivet_core::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WherePredicate {
    Comparison { field: Vec<String>, op: Cmp, value: Value },
    In { field: Vec<String>, values: Vec<Value> },
    Like { field: Vec<String>, pattern: String, case_insensitive: bool },
    And(Vec<WherePredicate>),
    Or(Vec<WherePredicate>),
    Not(Box<WherePredicate>),
    /// A predicate the subset algorithm can't reason about precisely
    /// (an opaque function node, an unsupported operator, ...).
    Unknown,
}

impl WherePredicate {
    pub fn eq(field: &[&str], value: impl Into<Value>) -> Self {
        WherePredicate::Comparison { field: path(field), op: Cmp::Eq, value: value.into() }
    }
    pub fn gt(field: &[&str], value: impl Into<Value>) -> Self {
        WherePredicate::Comparison { field: path(field), op: Cmp::Gt, value: value.into() }
    }
    pub fn gte(field: &[&str], value: impl Into<Value>) -> Self {
        WherePredicate::Comparison { field: path(field), op: Cmp::Gte, value: value.into() }
    }
    pub fn lt(field: &[&str], value: impl Into<Value>) -> Self {
        WherePredicate::Comparison { field: path(field), op: Cmp::Lt, value: value.into() }
    }
    pub fn lte(field: &[&str], value: impl Into<Value>) -> Self {
        WherePredicate::Comparison { field: path(field), op: Cmp::Lte, value: value.into() }
    }
    pub fn and(parts: Vec<WherePredicate>) -> Self {
        WherePredicate::And(parts)
    }
    pub fn or(parts: Vec<WherePredicate>) -> Self {
        WherePredicate::Or(parts)
    }
}

fn path(field: &[&str]) -> Vec<String> {
    field.iter().map(|s| s.to_string()).collect()
}

/// A single-field constraint within one conjunction (an AND-clause of the
/// DNF expansion). `unknown` poisons the whole field: nothing can be
/// proven to entail or be entailed by it.
#[derive(Clone, Debug, Default)]
struct FieldConstraint {
    lower: Option<(Value, bool)>, // (bound, exclusive)
    upper: Option<(Value, bool)>,
    eq: Option<Value>,
    in_set: Option<Vec<Value>>,
    pattern: Option<(String, bool)>,
    unknown: bool,
}

impl FieldConstraint {
    fn tighten_lower(&mut self, bound: Value, exclusive: bool) {
        let tighter = match &self.lower {
            Some((cur, cur_excl)) => bound > *cur || (bound == *cur && exclusive && !cur_excl),
            None => true,
        };
        if tighter {
            self.lower = Some((bound, exclusive));
        }
    }

    fn tighten_upper(&mut self, bound: Value, exclusive: bool) {
        let tighter = match &self.upper {
            Some((cur, cur_excl)) => bound < *cur || (bound == *cur && exclusive && !cur_excl),
            None => true,
        };
        if tighter {
            self.upper = Some((bound, exclusive));
        }
    }

    fn add(&mut self, op: Cmp, value: Value) {
        match op {
            Cmp::Eq => {
                if self.eq.as_ref().is_some_and(|e| e != &value) {
                    self.unknown = true; // contradictory eq constraints; not expected from real queries
                }
                self.eq = Some(value);
            }
            Cmp::Gt => self.tighten_lower(value, true),
            Cmp::Gte => self.tighten_lower(value, false),
            Cmp::Lt => self.tighten_upper(value, true),
            Cmp::Lte => self.tighten_upper(value, false),
        }
    }

    fn add_in(&mut self, mut values: Vec<Value>) {
        match &mut self.in_set {
            Some(existing) => {
                existing.retain(|v| values.contains(v));
            }
            None => {
                values.sort();
                values.dedup();
                self.in_set = Some(values);
            }
        }
    }

    /// The effective `(lower, upper)` interval this constraint implies,
    /// derived from `eq`/`in_set` when no explicit range was given.
    fn effective_bounds(&self) -> (Option<(Value, bool)>, Option<(Value, bool)>) {
        if let Some(v) = &self.eq {
            return (Some((v.clone(), false)), Some((v.clone(), false)));
        }
        if let Some(values) = &self.in_set {
            let lo = values.iter().min().cloned();
            let hi = values.iter().max().cloned();
            return (lo.map(|v| (v, false)), hi.map(|v| (v, false)));
        }
        (self.lower.clone(), self.upper.clone())
    }

    /// True if every value satisfying `self` also satisfies `other`.
    fn entails(&self, other: &FieldConstraint) -> bool {
        if self.unknown || other.unknown {
            return false;
        }
        if let Some(pattern) = &other.pattern {
            return self.pattern.as_ref() == Some(pattern);
        }
        if let Some(ov) = &other.eq {
            return self.eq.as_ref() == Some(ov)
                || matches!(&self.in_set, Some(v) if v.len() == 1 && &v[0] == ov);
        }
        if let Some(oset) = &other.in_set {
            if let Some(v) = &self.eq {
                return oset.contains(v);
            }
            if let Some(sset) = &self.in_set {
                return sset.iter().all(|v| oset.contains(v));
            }
            return false;
        }
        let (self_lo, self_hi) = self.effective_bounds();
        let (other_lo, other_hi) = other.effective_bounds();
        bound_implies_lower(&self_lo, &other_lo) && bound_implies_upper(&self_hi, &other_hi)
    }
}

fn bound_implies_lower(narrower: &Option<(Value, bool)>, wider: &Option<(Value, bool)>) -> bool {
    match (narrower, wider) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some((nv, nx)), Some((wv, wx))) => nv > wv || (nv == wv && (*nx || !wx)),
    }
}

fn bound_implies_upper(narrower: &Option<(Value, bool)>, wider: &Option<(Value, bool)>) -> bool {
    match (narrower, wider) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some((nv, nx)), Some((wv, wx))) => nv < wv || (nv == wv && (*nx || !wx)),
    }
}

/// A conjunction (AND-clause) of the DNF expansion: per-field constraints,
/// keyed by the field's rendered path.
#[derive(Clone, Debug, Default)]
struct Conjunction {
    fields: Vec<(String, FieldConstraint)>,
}

impl Conjunction {
    fn field_mut(&mut self, key: &str) -> &mut FieldConstraint {
        if let Some(pos) = self.fields.iter().position(|(k, _)| k == key) {
            &mut self.fields[pos].1
        } else {
            self.fields.push((key.to_string(), FieldConstraint::default()));
            &mut self.fields.last_mut().unwrap().1
        }
    }

    fn merge(&self, other: &Conjunction) -> Conjunction {
        let mut out = self.clone();
        for (k, c) in &other.fields {
            let slot = out.field_mut(k);
            match (&c.eq, &c.in_set, &c.pattern) {
                (Some(v), _, _) => slot.add(Cmp::Eq, v.clone()),
                (_, Some(values), _) => slot.add_in(values.clone()),
                (_, _, Some((p, ci))) => {
                    if slot.pattern.as_ref().is_some_and(|existing| existing != &(p.clone(), *ci)) {
                        slot.unknown = true;
                    }
                    slot.pattern = Some((p.clone(), *ci));
                }
                _ => {}
            }
            if let Some((b, x)) = &c.lower {
                slot.tighten_lower(b.clone(), *x);
            }
            if let Some((b, x)) = &c.upper {
                slot.tighten_upper(b.clone(), *x);
            }
            slot.unknown |= c.unknown;
        }
        out
    }

    /// True if this conjunction entails `other`: every field constrained in
    /// `other` is implied by this conjunction's constraint on that field.
    fn entails(&self, other: &Conjunction) -> bool {
        other.fields.iter().all(|(key, oc)| match self.fields.iter().find(|(k, _)| k == key) {
            Some((_, sc)) => sc.entails(oc),
            None => false,
        })
    }
}

fn field_key(field: &[String]) -> String {
    field.join(".")
}

fn single(field: &[String], op: Cmp, value: Value) -> Conjunction {
    let mut c = Conjunction::default();
    c.field_mut(&field_key(field)).add(op, value);
    c
}

fn single_in(field: &[String], values: Vec<Value>) -> Conjunction {
    let mut c = Conjunction::default();
    c.field_mut(&field_key(field)).add_in(values);
    c
}

fn single_like(field: &[String], pattern: String, ci: bool) -> Conjunction {
    let mut c = Conjunction::default();
    c.field_mut(&field_key(field)).pattern = Some((pattern, ci));
    c
}

fn unknown_conjunction() -> Conjunction {
    let mut c = Conjunction::default();
    c.field_mut("\u{0}unknown").unknown = true;
    c
}

fn invert_cmp(op: Cmp) -> Option<Cmp> {
    match op {
        Cmp::Gt => Some(Cmp::Lte),
        Cmp::Gte => Some(Cmp::Lt),
        Cmp::Lt => Some(Cmp::Gte),
        Cmp::Lte => Some(Cmp::Gt),
        Cmp::Eq => None,
    }
}

/// Disjunctive-normal-form expansion: a `Vec` of conjunctions whose union
/// is equivalent to the input predicate (modulo the `Unknown` escape hatch,
/// which widens rather than narrows the represented set so entailment
/// checks involving it always fail rather than falsely succeed).
fn to_dnf(pred: &WherePredicate) -> Vec<Conjunction> {
    match pred {
        WherePredicate::Comparison { field, op, value } => vec![single(field, *op, value.clone())],
        WherePredicate::In { field, values } => vec![single_in(field, values.clone())],
        WherePredicate::Like { field, pattern, case_insensitive } => {
            vec![single_like(field, pattern.clone(), *case_insensitive)]
        }
        WherePredicate::Unknown => vec![unknown_conjunction()],
        WherePredicate::And(parts) => {
            let mut acc = vec![Conjunction::default()];
            for part in parts {
                let part_dnf = to_dnf(part);
                let mut next = Vec::with_capacity(acc.len() * part_dnf.len());
                for a in &acc {
                    for b in &part_dnf {
                        next.push(a.merge(b));
                    }
                }
                acc = next;
            }
            acc
        }
        WherePredicate::Or(parts) => parts.iter().flat_map(to_dnf).collect(),
        WherePredicate::Not(inner) => negate(inner),
    }
}

/// De Morgan push-down of a negation to the leaves. `not(eq)`/`not(in)`/
/// `not(like)` have no clean interval representation, so they become
/// `Unknown` (conservative, never a false subset claim).
fn negate(pred: &WherePredicate) -> Vec<Conjunction> {
    match pred {
        WherePredicate::Comparison { op, .. } if invert_cmp(*op).is_none() => vec![unknown_conjunction()],
        WherePredicate::Comparison { field, op, value } => {
            vec![single(field, invert_cmp(*op).unwrap(), value.clone())]
        }
        WherePredicate::In { .. } | WherePredicate::Like { .. } | WherePredicate::Unknown => {
            vec![unknown_conjunction()]
        }
        WherePredicate::Not(inner) => to_dnf(inner),
        WherePredicate::And(parts) => parts.iter().flat_map(negate).collect(),
        WherePredicate::Or(parts) => {
            let mut acc = vec![Conjunction::default()];
            for part in parts {
                let part_dnf = negate(part);
                let mut next = Vec::with_capacity(acc.len() * part_dnf.len());
                for a in &acc {
                    for b in &part_dnf {
                        next.push(a.merge(b));
                    }
                }
                acc = next;
            }
            acc
        }
    }
}

/// spec.md §4.3 `isWhereSubset(a, b)`: true iff every row satisfying `a`
/// also satisfies `b`, decidably so for the supported comparison set.
pub fn is_where_subset(a: &WherePredicate, b: &WherePredicate) -> bool {
    let a_dnf = to_dnf(a);
    let b_dnf = to_dnf(b);
    a_dnf.iter().all(|ac| b_dnf.iter().any(|bc| ac.entails(bc)))
}

/// spec.md §4.3 `unionWherePredicates`: canonical `a OR b`.
pub fn union_where_predicates(a: WherePredicate, b: WherePredicate) -> WherePredicate {
    WherePredicate::Or(vec![a, b])
}

/// spec.md §4.3 `minusWherePredicates`: `a AND NOT b`.
pub fn minus_where_predicates(a: WherePredicate, b: WherePredicate) -> WherePredicate {
    WherePredicate::And(vec![a, WherePredicate::Not(Box::new(b))])
}

/// spec.md §4.3 `isOrderBySubset`: `a`'s ordering is usable wherever `b`'s
/// is demanded iff they're the same clause sequence (a strict prefix or
/// reordering isn't a valid substitute for sorted iteration order).
pub fn is_order_by_subset(a: &[OrderByClause], b: &[OrderByClause]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| ir_eq(&x.expression, &y.expression) && x.direction == y.direction)
}

fn ir_eq(a: &crate::ir::Ir, b: &crate::ir::Ir) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

/// spec.md §4.3 `isLimitSubset`: an `(offset, limit)` window `a` is usable
/// to serve a demand for window `b` iff `a`'s window fully covers `b`'s.
pub fn is_limit_subset(a: Option<(usize, usize)>, b: Option<(usize, usize)>) -> bool {
    match (a, b) {
        (None, _) => true, // a has no limit: it holds everything, covers any window
        (Some(_), None) => false,
        (Some((a_off, a_lim)), Some((b_off, b_lim))) => a_off <= b_off && a_off + a_lim >= b_off + b_lim,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn is_predicate_subset(
    a_where: &WherePredicate,
    a_order: &[OrderByClause],
    a_window: Option<(usize, usize)>,
    b_where: &WherePredicate,
    b_order: &[OrderByClause],
    b_window: Option<(usize, usize)>,
) -> bool {
    is_where_subset(a_where, b_where)
        && (b_order.is_empty() || is_order_by_subset(a_order, b_order))
        && is_limit_subset(a_window, b_window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tighter_gt_is_subset_of_looser_gt() {
        let a = WherePredicate::gt(&["age"], 30i64);
        let b = WherePredicate::gt(&["age"], 20i64);
        assert!(is_where_subset(&a, &b));
        assert!(!is_where_subset(&b, &a));
    }

    #[test]
    fn eq_is_subset_of_containing_range() {
        let a = WherePredicate::eq(&["age"], 25i64);
        let b = WherePredicate::gte(&["age"], 20i64);
        assert!(is_where_subset(&a, &b));
    }

    #[test]
    fn conjunction_subset_requires_every_field() {
        let a = WherePredicate::and(vec![
            WherePredicate::gt(&["age"], 30i64),
            WherePredicate::eq(&["status"], "active"),
        ]);
        let b = WherePredicate::gt(&["age"], 20i64);
        assert!(is_where_subset(&a, &b));

        let c = WherePredicate::and(vec![WherePredicate::gt(&["age"], 30i64), WherePredicate::eq(&["status"], "banned")]);
        assert!(!is_where_subset(&a, &c));
    }

    #[test]
    fn unrelated_predicates_are_not_subsets() {
        let a = WherePredicate::gt(&["age"], 30i64);
        let b = WherePredicate::lt(&["age"], 10i64);
        assert!(!is_where_subset(&a, &b));
    }

    #[test]
    fn negated_eq_is_conservatively_unknown() {
        let a = WherePredicate::Not(Box::new(WherePredicate::eq(&["age"], 30i64)));
        let b = WherePredicate::gt(&["age"], 0i64);
        assert!(!is_where_subset(&a, &b), "not(eq) has no interval representation; must not claim subset");
    }

    #[test]
    fn or_is_subset_when_every_branch_is() {
        let a = WherePredicate::or(vec![WherePredicate::eq(&["age"], 25i64), WherePredicate::eq(&["age"], 26i64)]);
        let b = WherePredicate::gte(&["age"], 20i64);
        assert!(is_where_subset(&a, &b));
    }

    #[test]
    fn limit_subset_requires_full_window_coverage() {
        assert!(is_limit_subset(Some((0, 100)), Some((0, 10))));
        assert!(is_limit_subset(Some((0, 100)), Some((50, 10))));
        assert!(!is_limit_subset(Some((0, 10)), Some((5, 10))));
        assert!(is_limit_subset(None, Some((50, 10))));
    }

    #[test]
    fn in_subset_of_superset_in() {
        let a = WherePredicate::In { field: vec!["status".into()], values: vec![Value::from("active")] };
        let b = WherePredicate::In { field: vec!["status".into()], values: vec![Value::from("active"), Value::from("pending")] };
        assert!(is_where_subset(&a, &b));
        assert!(!is_where_subset(&b, &a));
    }
}
