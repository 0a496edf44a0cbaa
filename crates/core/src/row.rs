//! Row structure for the rivet reactive collection engine.
//!
//! A `Row` is an insertion-ordered mapping from field name to [`Value`].
//! Collections carry no schema, so a row is just the data a caller inserted,
//! plus whatever a query projected. Insertion order is preserved because
//! callers (and snapshot tests) rely on stable field iteration order for
//! equal rows built the same way.

use crate::value::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single row: an ordered set of field/value pairs.
#[derive(Clone, Debug, Default)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Row { fields: Vec::new() }
    }

    /// Builds a row from a list of field/value pairs, preserving order.
    /// If a field name repeats, the last occurrence wins and keeps the
    /// position of the first occurrence.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut row = Row::new();
        for (k, v) in pairs {
            row.set(k.into(), v.into());
        }
        row
    }

    /// Returns the value at `field`, if present. A missing field returns
    /// `None`; a field explicitly set to `Value::Null` returns
    /// `Some(&Value::Null)` — these are distinct.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    /// Sets `field` to `value`, overwriting any existing value but keeping
    /// the field's original position if it already existed.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == field) {
            slot.1 = value;
        } else {
            self.fields.push((field, value));
        }
    }

    /// Removes `field`, returning its previous value if present.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(k, _)| k == field)?;
        Some(self.fields.remove(idx).1)
    }

    /// True if `field` is present (regardless of whether its value is null).
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Returns a row containing only the named fields, in the order given.
    /// Fields absent from `self` are silently skipped.
    pub fn project(&self, fields: &[&str]) -> Row {
        let mut row = Row::new();
        for field in fields {
            if let Some(value) = self.get(field) {
                row.set(*field, value.clone());
            }
        }
        row
    }

    /// Merges `other` into a copy of `self`: fields in `other` overwrite
    /// fields of the same name in `self`; new fields from `other` are
    /// appended after `self`'s existing fields.
    pub fn merged_with(&self, other: &Row) -> Row {
        let mut row = self.clone();
        for (k, v) in other.iter() {
            row.set(k, v.clone());
        }
        row
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        if self.fields.len() != other.fields.len() {
            return false;
        }
        self.fields.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for Row {}

/// Order-independent: hashes fields sorted by name, matching `PartialEq`'s
/// order-independence so equal rows always hash equal.
impl Hash for Row {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut sorted: Vec<&(String, Value)> = self.fields.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        sorted.len().hash(state);
        for (k, v) in sorted {
            k.hash(state);
            v.hash(state);
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k:?}: {v:?}")?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Row::from_pairs(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_roundtrip() {
        let mut row = Row::new();
        row.set("name", "alice");
        row.set("age", 30i64);
        assert_eq!(row.get("name"), Some(&Value::String("alice".to_string())));
        assert_eq!(row.get("age"), Some(&Value::Int(30)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn null_field_distinct_from_missing() {
        let mut row = Row::new();
        row.set("x", Value::Null);
        assert!(row.contains("x"));
        assert_eq!(row.get("x"), Some(&Value::Null));
        assert!(!row.contains("y"));
        assert_eq!(row.get("y"), None);
    }

    #[test]
    fn insertion_order_preserved() {
        let row = Row::from_pairs(vec![("b", Value::Int(1)), ("a", Value::Int(2))]);
        let names: Vec<&str> = row.field_names().collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn set_keeps_original_position() {
        let mut row = Row::from_pairs(vec![("a", Value::Int(1)), ("b", Value::Int(2))]);
        row.set("a", Value::Int(99));
        let names: Vec<&str> = row.field_names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(row.get("a"), Some(&Value::Int(99)));
    }

    #[test]
    fn hash_ignores_field_order() {
        use std::collections::HashSet;
        let a = Row::from_pairs(vec![("a", Value::Int(1)), ("b", Value::Int(2))]);
        let b = Row::from_pairs(vec![("b", Value::Int(2)), ("a", Value::Int(1))]);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn equality_ignores_field_order() {
        let a = Row::from_pairs(vec![("a", Value::Int(1)), ("b", Value::Int(2))]);
        let b = Row::from_pairs(vec![("b", Value::Int(2)), ("a", Value::Int(1))]);
        assert_eq!(a, b);
    }

    #[test]
    fn project_skips_absent_fields() {
        let row = Row::from_pairs(vec![("a", Value::Int(1)), ("b", Value::Int(2))]);
        let projected = row.project(&["a", "c"]);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.get("a"), Some(&Value::Int(1)));
    }

    #[test]
    fn merged_with_overwrites_and_appends() {
        let base = Row::from_pairs(vec![("a", Value::Int(1)), ("b", Value::Int(2))]);
        let patch = Row::from_pairs(vec![("b", Value::Int(20)), ("c", Value::Int(3))]);
        let merged = base.merged_with(&patch);
        assert_eq!(merged.get("a"), Some(&Value::Int(1)));
        assert_eq!(merged.get("b"), Some(&Value::Int(20)));
        assert_eq!(merged.get("c"), Some(&Value::Int(3)));
    }
}
