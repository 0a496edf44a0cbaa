//! Value type definitions for the rivet reactive collection engine.
//!
//! This module defines the `Value` enum: any value that can be stored in a
//! row field. Values are JSON-shaped (null/bool/int/float/string/array/
//! object) rather than SQL-typed, because collections carry no schema.

use crate::row::Row;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Default tolerance used when comparing two `Value::Float` for equality.
pub const DEFAULT_FLOAT_TOLERANCE: f64 = 1e-12;

/// A value that can be stored in a row field.
#[derive(Clone, Debug)]
pub enum Value {
    /// Absence of a value, distinct from a field simply not being present.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Mapping of string field name to value. Insertion order is not
    /// significant for `Object` (unlike `Row`, which preserves it) since
    /// nested objects are compared structurally, not displayed.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Returns true if this value is `Null`.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this value is "truthy" in the sense the executor uses when a
    /// predicate expression yields a non-boolean (e.g. coalesce chains).
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }

    /// Structural equality using an explicit float tolerance instead of the
    /// default `PartialEq` (which uses [`DEFAULT_FLOAT_TOLERANCE`]).
    pub fn eq_with_tolerance(&self, other: &Value, tolerance: f64) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => float_eq(*a, *b, tolerance),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                float_eq(*a as f64, *b, tolerance)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x.eq_with_tolerance(y, tolerance))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.get(k).map(|bv| v.eq_with_tolerance(bv, tolerance)).unwrap_or(false)
                    })
            }
            _ => false,
        }
    }

    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
            Value::Array(_) => 5,
            Value::Object(_) => 6,
        }
    }
}

fn float_eq(a: f64, b: f64, tolerance: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    (a - b).abs() <= tolerance
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_with_tolerance(other, DEFAULT_FLOAT_TOLERANCE)
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(a), Value::Float(b)) => cmp_f64(*a as f64, *b),
            (Value::Float(a), Value::Int(b)) => cmp_f64(*a, *b as f64),
            (Value::Float(a), Value::Float(b)) => cmp_f64(*a, *b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Object(a), Value::Object(b)) => a.cmp(b),
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Buckets a number to the nearest multiple of [`DEFAULT_FLOAT_TOLERANCE`]
/// so `Hash` agrees with `PartialEq` (which compares numbers, `Int` and
/// `Float` alike, under that same tolerance). NaN gets a fixed bucket since
/// `eq_with_tolerance` treats every NaN as equal to every other.
fn numeric_bucket(v: f64) -> i64 {
    if v.is_nan() {
        return i64::MIN;
    }
    (v / DEFAULT_FLOAT_TOLERANCE).round() as i64
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            // Int and Float share a discriminant and a bucketed value so
            // that `Int(n) == Float(n as f64)` also hashes equal.
            Value::Int(i) => {
                2u8.hash(state);
                numeric_bucket(*i as f64).hash(state);
            }
            Value::Float(f) => {
                2u8.hash(state);
                numeric_bucket(*f).hash(state);
            }
            Value::String(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Value::Array(a) => {
                4u8.hash(state);
                a.hash(state);
            }
            Value::Object(o) => {
                5u8.hash(state);
                o.hash(state);
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl From<&Row> for Value {
    fn from(row: &Row) -> Self {
        Value::Object(row.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_distinct_from_missing() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Int(0));
    }

    #[test]
    fn float_tolerance_default() {
        let a = Value::Float(1.0);
        let b = Value::Float(1.0 + 1e-13);
        assert_eq!(a, b, "difference within default tolerance must compare equal");

        let c = Value::Float(1.0 + 1e-6);
        assert_ne!(a, c, "difference beyond default tolerance must compare unequal");
    }

    #[test]
    fn nan_equals_nan() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn ordering_cross_numeric() {
        assert!(Value::Int(1) < Value::Int(2));
        assert!(Value::Int(1) < Value::Float(1.5));
        assert!(Value::Null < Value::Int(0));
    }

    #[test]
    fn array_and_object_equality() {
        let a = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(a, b);

        let mut m1 = BTreeMap::new();
        m1.insert("a".to_string(), Value::Int(1));
        let mut m2 = BTreeMap::new();
        m2.insert("a".to_string(), Value::Int(1));
        assert_eq!(Value::Object(m1), Value::Object(m2));
    }

    #[test]
    fn equal_values_hash_equal() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of(v: &Value) -> u64 {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        }

        let int_val = Value::Int(1);
        let float_val = Value::Float(1.0);
        assert_eq!(int_val, float_val);
        assert_eq!(hash_of(&int_val), hash_of(&float_val), "Int(1) == Float(1.0) must hash equal");

        let a = Value::Float(1.0);
        let b = Value::Float(1.0 + 1e-13);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b), "near-tolerance floats that compare equal must hash equal");

        let n1 = Value::Float(f64::NAN);
        let n2 = Value::Float(f64::NAN);
        assert_eq!(n1, n2);
        assert_eq!(hash_of(&n1), hash_of(&n2));
    }

    #[test]
    fn value_as_hashmap_key_consolidates_cross_variant_numeric_keys() {
        use std::collections::HashMap;

        let mut groups: HashMap<Value, i64> = HashMap::new();
        *groups.entry(Value::Int(1)).or_insert(0) += 1;
        *groups.entry(Value::Float(1.0)).or_insert(0) += 1;
        assert_eq!(groups.len(), 1, "Int(1) and Float(1.0) must land in the same bucket");
        assert_eq!(groups[&Value::Int(1)], 2);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
    }

    #[test]
    fn from_impls() {
        let v: Value = 42i64.into();
        assert_eq!(v.as_int(), Some(42));
        let v: Value = "hi".into();
        assert_eq!(v.as_str(), Some("hi"));
        let v: Value = None::<i64>.into();
        assert!(v.is_null());
    }
}
