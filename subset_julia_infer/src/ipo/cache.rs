//! Global inference result cache.
//!
//! The cache maps a specialization key to the results inferred for it, each
//! tagged with the world-age window in which it holds. It is shared by
//! every request and may be read concurrently. Writes are first-writer-wins:
//! a result whose window overlaps an existing entry for the same key is
//! discarded, since both describe the same worlds.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::lattice::AbstractValue;

use super::call_graph::SpecKey;
use super::validity::WorldRange;

/// A finished inference result.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResult {
    pub return_type: AbstractValue,
    pub valid: WorldRange,
    /// Whether widening thresholds were hit while inferring it.
    pub limited: bool,
    /// Specializations the result depends on.
    pub edges: Vec<SpecKey>,
    pub ssa_types: Option<Vec<AbstractValue>>,
    pub cost: Option<u64>,
}

/// Cache for inference results, keyed by specialization.
#[derive(Debug, Default)]
pub struct InferenceCache {
    entries: RwLock<HashMap<SpecKey, Vec<CachedResult>>>,
}

impl InferenceCache {
    /// Create a new empty inference cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached result for `key` whose window contains `world`.
    pub fn get(&self, key: &SpecKey, world: u64) -> Option<CachedResult> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)?
            .iter()
            .find(|r| r.valid.contains(world))
            .cloned()
    }

    /// Store `result` unless an entry for the same worlds exists.
    ///
    /// Returns whether the result was stored.
    pub fn insert_if_absent(&self, key: SpecKey, result: CachedResult) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let results = entries.entry(key).or_default();
        if results.iter().any(|r| r.valid.overlaps(&result.valid)) {
            return false;
        }
        results.push(result);
        true
    }

    /// Check if a result is cached for `key` in `world`.
    pub fn contains(&self, key: &SpecKey, world: u64) -> bool {
        self.get(key, world).is_some()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached results over all keys.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method_table::MethodId;
    use std::sync::Arc;
    use std::thread;

    fn key() -> SpecKey {
        SpecKey::new(MethodId(0), vec![AbstractValue::int(1)])
    }

    fn result(ret: i64, valid: WorldRange) -> CachedResult {
        CachedResult {
            return_type: AbstractValue::int(ret),
            valid,
            limited: false,
            edges: Vec::new(),
            ssa_types: None,
            cost: None,
        }
    }

    #[test]
    fn test_get_respects_world() {
        let cache = InferenceCache::new();
        assert!(cache.insert_if_absent(key(), result(1, WorldRange::new(1, 4))));
        assert!(cache.insert_if_absent(key(), result(2, WorldRange::since(5))));
        assert_eq!(cache.get(&key(), 3).map(|r| r.return_type), Some(AbstractValue::int(1)));
        assert_eq!(cache.get(&key(), 9).map(|r| r.return_type), Some(AbstractValue::int(2)));
        assert!(!cache.contains(&key(), 0));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = InferenceCache::new();
        assert!(cache.insert_if_absent(key(), result(1, WorldRange::since(1))));
        assert!(!cache.insert_if_absent(key(), result(2, WorldRange::new(3, 6))));
        assert_eq!(cache.get(&key(), 4).map(|r| r.return_type), Some(AbstractValue::int(1)));
    }

    #[test]
    fn test_clear() {
        let cache = InferenceCache::new();
        cache.insert_if_absent(key(), result(1, WorldRange::new(1, 2)));
        cache.insert_if_absent(key(), result(2, WorldRange::since(3)));
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_insert_keeps_one() {
        let cache = Arc::new(InferenceCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.insert_if_absent(key(), result(i, WorldRange::ALL)))
            })
            .collect();
        let stored = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|stored| *stored)
            .count();
        assert_eq!(stored, 1);
        assert_eq!(cache.len(), 1);
    }
}
