//! Index trait definitions.
//!
//! Every index maps an indexed expression's evaluated `Value` to the set of
//! row keys whose row currently evaluates to that value, per spec.md §3's
//! `Index` attribute (`expression`, `kind`, `entries: keyExpr-value →
//! set-of-row-keys`).

use rivet_core::{Key, Value};

/// A key range for index queries, generic over the ordered key type so it
/// can describe both equality and ordered index lookups.
#[derive(Clone, Debug, PartialEq)]
pub enum KeyRange<K> {
    All,
    Only(K),
    LowerBound { value: K, exclusive: bool },
    UpperBound { value: K, exclusive: bool },
    Bound { lower: K, upper: K, lower_exclusive: bool, upper_exclusive: bool },
}

impl<K: Clone + Ord> KeyRange<K> {
    pub fn all() -> Self {
        KeyRange::All
    }

    pub fn only(key: K) -> Self {
        KeyRange::Only(key)
    }

    pub fn lower_bound(value: K, exclusive: bool) -> Self {
        KeyRange::LowerBound { value, exclusive }
    }

    pub fn upper_bound(value: K, exclusive: bool) -> Self {
        KeyRange::UpperBound { value, exclusive }
    }

    pub fn bound(lower: K, upper: K, lower_exclusive: bool, upper_exclusive: bool) -> Self {
        KeyRange::Bound { lower, upper, lower_exclusive, upper_exclusive }
    }

    pub fn is_only(&self) -> bool {
        matches!(self, KeyRange::Only(_))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, KeyRange::All)
    }

    pub fn contains(&self, key: &K) -> bool {
        match self {
            KeyRange::All => true,
            KeyRange::Only(k) => key == k,
            KeyRange::LowerBound { value, exclusive } => {
                if *exclusive {
                    key > value
                } else {
                    key >= value
                }
            }
            KeyRange::UpperBound { value, exclusive } => {
                if *exclusive {
                    key < value
                } else {
                    key <= value
                }
            }
            KeyRange::Bound { lower, upper, lower_exclusive, upper_exclusive } => {
                let lower_ok = if *lower_exclusive { key > lower } else { key >= lower };
                let upper_ok = if *upper_exclusive { key < upper } else { key <= upper };
                lower_ok && upper_ok
            }
        }
    }
}

/// Core trait for secondary indexes over a collection's row keys.
///
/// Indexed values are always `rivet_core::Value` (the result of evaluating
/// the indexed expression against a row); the stored values are row `Key`s,
/// matching spec.md §3's `entries: keyExpr-value → set-of-row-keys`.
pub trait Index {
    /// Adds an entry. For unique (`equality`, `singleResult`-backed) indexes
    /// this fails if `value` already maps to a different row key.
    fn add(&mut self, value: Value, row: Key) -> Result<(), IndexError>;

    /// Removes a specific row key for `value`, or all row keys for `value`
    /// if `row` is `None`.
    fn remove(&mut self, value: &Value, row: Option<&Key>);

    /// Returns all row keys currently mapped to `value`.
    fn get(&self, value: &Value) -> Vec<Key>;

    fn contains_value(&self, value: &Value) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Estimated number of row keys a query against `range` would touch —
    /// used by the query compiler's index-selection policy (spec.md §4.6).
    fn cost(&self, range: &KeyRange<Value>) -> usize;
}

/// Indexes that can additionally resolve ordered range queries
/// (`kind: ordered`), e.g. `gt`/`lt`/`gte`/`lte` predicates.
pub trait RangeIndex: Index {
    fn get_range(
        &self,
        range: Option<&KeyRange<Value>>,
        reverse: bool,
        limit: Option<usize>,
        skip: usize,
    ) -> Vec<Key>;
}

/// Error raised by index mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexError {
    DuplicateKey,
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::DuplicateKey => write!(f, "duplicate value in unique index"),
        }
    }
}

impl std::error::Error for IndexError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_range_only() {
        let range = KeyRange::only(5);
        assert!(!range.contains(&4));
        assert!(range.contains(&5));
        assert!(!range.contains(&6));
    }

    #[test]
    fn key_range_bound_exclusive() {
        let range = KeyRange::bound(3, 7, true, true);
        assert!(!range.contains(&3));
        assert!(range.contains(&5));
        assert!(!range.contains(&7));
    }

    #[test]
    fn key_range_lower_upper() {
        let lower = KeyRange::lower_bound(5, false);
        assert!(lower.contains(&5));
        assert!(!lower.contains(&4));

        let upper = KeyRange::upper_bound(5, true);
        assert!(!upper.contains(&5));
        assert!(upper.contains(&4));
    }
}
