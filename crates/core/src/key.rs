//! Row key model.
//!
//! A `Key` identifies a row within a collection. Keys are either an integer
//! or a string, matching the two primitive id shapes callers pass in
//! practice (auto-increment ids and UUID/slug-style ids). Composite keys
//! (multiple fields) are rendered into a single `Key::String` via
//! [`Key::composite`] so that a collection's key space stays a flat
//! `Key` regardless of how many fields the caller's id is made of.

use crate::value::Value;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The identity of a row within a collection.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Int(i64),
    String(String),
}

impl Key {
    /// Builds a composite key from multiple parts by rendering each part
    /// and joining them with a separator that cannot appear unescaped in a
    /// rendered part, so that two different part tuples never collide.
    pub fn composite(parts: &[Key]) -> Key {
        let rendered: Vec<String> = parts.iter().map(Key::render_part).collect();
        Key::String(rendered.join("\u{1}"))
    }

    fn render_part(key: &Key) -> String {
        match key {
            Key::Int(i) => format!("i:{i}"),
            Key::String(s) => format!("s:{}:{}", s.len(), s),
        }
    }

    /// Attempts to build a `Key` out of a value, for collections that key
    /// rows by a designated field. Returns `None` if the value isn't an
    /// int or string (e.g. null, bool, float, array, object).
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Int(i) => Some(Key::Int(*i)),
            Value::String(s) => Some(Key::String(s.clone())),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Value {
        match self {
            Key::Int(i) => Value::Int(*i),
            Key::String(s) => Value::String(s.clone()),
        }
    }

    /// A stable key derived from an arbitrary hashable value's content,
    /// for operators that need to identify a row by its data rather than
    /// by a designated id field (e.g. a GroupBy output row's group value,
    /// or a Distinct operator's deduplicated row identity).
    pub fn hashed(value: &impl Hash) -> Key {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        Key::Int(hasher.finish() as i64)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::String(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_keys_with_different_parts_never_collide() {
        // Without length-prefixing, ("ab", "c") and ("a", "bc") would render
        // identically when naively joined.
        let a = Key::composite(&[Key::String("ab".into()), Key::String("c".into())]);
        let b = Key::composite(&[Key::String("a".into()), Key::String("bc".into())]);
        assert_ne!(a, b);
    }

    #[test]
    fn composite_key_distinguishes_int_and_string_parts() {
        let a = Key::composite(&[Key::Int(1), Key::String("x".into())]);
        let b = Key::composite(&[Key::String("1".into()), Key::String("x".into())]);
        assert_ne!(a, b);
    }

    #[test]
    fn from_value_rejects_non_key_shapes() {
        assert_eq!(Key::from_value(&Value::Null), None);
        assert_eq!(Key::from_value(&Value::Bool(true)), None);
        assert_eq!(Key::from_value(&Value::Int(5)), Some(Key::Int(5)));
        assert_eq!(
            Key::from_value(&Value::String("x".into())),
            Some(Key::String("x".into()))
        );
    }
}
