//! Delta type for Incremental View Maintenance.
//!
//! A Delta represents a change to a data item, with a diff value indicating
//! whether it's an insertion (+1) or deletion (-1). This is the internal
//! multiplicity-bearing representation operators use for bookkeeping
//! (multiset membership, join arity, group aggregation); it sits beneath
//! the `rivet_core::Change<T>` batches that cross operator boundaries — see
//! `change_bridge` for the conversion between the two.

/// A differential change to a data item.
///
/// The `diff` field indicates the multiplicity of the change:
/// - `+1` means insertion
/// - `-1` means deletion
/// - Other values can represent multiple insertions/deletions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delta<T> {
    /// The data being changed
    pub data: T,
    /// The differential: +1 for insert, -1 for delete
    pub diff: i32,
}

impl<T> Delta<T> {
    /// Creates a new delta with the given data and diff.
    #[inline]
    pub fn new(data: T, diff: i32) -> Self {
        Self { data, diff }
    }

    /// Creates an insertion delta (+1).
    #[inline]
    pub fn insert(data: T) -> Self {
        Self { data, diff: 1 }
    }

    /// Creates a deletion delta (-1).
    #[inline]
    pub fn delete(data: T) -> Self {
        Self { data, diff: -1 }
    }

    /// Returns true if this is an insertion (diff > 0).
    #[inline]
    pub fn is_insert(&self) -> bool {
        self.diff > 0
    }

    /// Returns true if this is a deletion (diff < 0).
    #[inline]
    pub fn is_delete(&self) -> bool {
        self.diff < 0
    }

    /// Returns true if this delta has no effect (diff == 0).
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.diff == 0
    }

    /// Maps the data to a new type.
    #[inline]
    pub fn map<U, F>(self, f: F) -> Delta<U>
    where
        F: FnOnce(T) -> U,
    {
        Delta {
            data: f(self.data),
            diff: self.diff,
        }
    }

    /// Returns a reference to the data.
    #[inline]
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Returns the diff value.
    #[inline]
    pub fn diff(&self) -> i32 {
        self.diff
    }

    /// Negates the diff (turns insert into delete and vice versa).
    #[inline]
    pub fn negate(self) -> Self {
        Self {
            data: self.data,
            diff: -self.diff,
        }
    }
}

impl<T: Clone> Delta<T> {
    /// Creates a negated copy of this delta.
    #[inline]
    pub fn negated(&self) -> Self {
        Self {
            data: self.data.clone(),
            diff: -self.diff,
        }
    }
}

/// A batch of deltas.
pub type DeltaBatch<T> = Vec<Delta<T>>;

/// Extension trait for working with delta batches.
pub trait DeltaBatchExt<T> {
    /// Filters out no-op deltas (diff == 0).
    fn compact(self) -> Self;

    /// Returns the net effect count (sum of all diffs).
    fn net_count(&self) -> i64;
}

impl<T> DeltaBatchExt<T> for DeltaBatch<T> {
    fn compact(self) -> Self {
        self.into_iter().filter(|d| d.diff != 0).collect()
    }

    fn net_count(&self) -> i64 {
        self.iter().map(|d| d.diff as i64).sum()
    }
}
