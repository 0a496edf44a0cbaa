//! Equality index: O(1) point lookups over a hashed `Value`.

use crate::stats::IndexStats;
use crate::traits::{Index, IndexError, KeyRange};
use hashbrown::HashMap;
use rivet_core::{Key, Value};

/// An equality (`kind: equality`) secondary index.
#[derive(Debug)]
pub struct HashIndex {
    map: HashMap<Value, Vec<Key>>,
    unique: bool,
    stats: IndexStats,
}

impl HashIndex {
    pub fn new(unique: bool) -> Self {
        HashIndex { map: HashMap::new(), unique, stats: IndexStats::new() }
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }
}

impl Index for HashIndex {
    fn add(&mut self, value: Value, row: Key) -> Result<(), IndexError> {
        if self.unique {
            if let Some(existing) = self.map.get(&value) {
                if !existing.contains(&row) {
                    return Err(IndexError::DuplicateKey);
                }
                return Ok(());
            }
        }
        self.map.entry(value).or_insert_with(Vec::new).push(row);
        self.stats.add_rows(1);
        Ok(())
    }

    fn remove(&mut self, value: &Value, row: Option<&Key>) {
        match row {
            Some(row) => {
                if let Some(rows) = self.map.get_mut(value) {
                    let before = rows.len();
                    rows.retain(|r| r != row);
                    let removed = before - rows.len();
                    if removed > 0 {
                        self.stats.remove_rows(removed);
                    }
                    if rows.is_empty() {
                        self.map.remove(value);
                    }
                }
            }
            None => {
                if let Some(rows) = self.map.remove(value) {
                    self.stats.remove_rows(rows.len());
                }
            }
        }
    }

    fn get(&self, value: &Value) -> Vec<Key> {
        self.map.get(value).cloned().unwrap_or_default()
    }

    fn contains_value(&self, value: &Value) -> bool {
        self.map.contains_key(value)
    }

    fn len(&self) -> usize {
        self.stats.total_rows()
    }

    fn clear(&mut self) {
        self.map.clear();
        self.stats.clear();
    }

    fn cost(&self, range: &KeyRange<Value>) -> usize {
        match range {
            KeyRange::All => self.stats.total_rows(),
            KeyRange::Only(value) => self.map.get(value).map(Vec::len).unwrap_or(0),
            // A hash index can't narrow a range query, so it reports the
            // worst case: the compiler should prefer a range index instead.
            _ => self.stats.total_rows(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_rejects_second_key_for_new_row() {
        let mut index = HashIndex::new(true);
        assert!(index.add(Value::Int(1), Key::Int(100)).is_ok());
        assert!(index.add(Value::Int(1), Key::Int(200)).is_err());
    }

    #[test]
    fn unique_add_is_idempotent_for_same_row() {
        let mut index = HashIndex::new(true);
        index.add(Value::Int(1), Key::Int(100)).unwrap();
        assert!(index.add(Value::Int(1), Key::Int(100)).is_ok());
        assert_eq!(index.get(&Value::Int(1)), vec![Key::Int(100)]);
    }

    #[test]
    fn non_unique_accumulates() {
        let mut index = HashIndex::new(false);
        index.add(Value::Int(1), Key::Int(100)).unwrap();
        index.add(Value::Int(1), Key::Int(101)).unwrap();
        assert_eq!(index.get(&Value::Int(1)), vec![Key::Int(100), Key::Int(101)]);
    }

    #[test]
    fn remove_specific_then_all() {
        let mut index = HashIndex::new(false);
        index.add(Value::Int(1), Key::Int(100)).unwrap();
        index.add(Value::Int(1), Key::Int(101)).unwrap();
        index.remove(&Value::Int(1), Some(&Key::Int(100)));
        assert_eq!(index.get(&Value::Int(1)), vec![Key::Int(101)]);
        index.remove(&Value::Int(1), None);
        assert!(index.get(&Value::Int(1)).is_empty());
        assert!(!index.contains_value(&Value::Int(1)));
    }

    #[test]
    fn cost_for_equality_vs_range() {
        let mut index = HashIndex::new(false);
        index.add(Value::Int(1), Key::Int(100)).unwrap();
        index.add(Value::Int(2), Key::Int(200)).unwrap();
        assert_eq!(index.cost(&KeyRange::only(Value::Int(1))), 1);
        assert_eq!(index.cost(&KeyRange::all()), 2);
    }
}
