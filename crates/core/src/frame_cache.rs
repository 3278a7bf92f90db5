//! Bounded, insertion-ordered cache of per-frame detection sets.
//!
//! Eviction removes the oldest *inserted* entry, not the least recently
//! used one. Reads never reorder entries.

use std::hash::Hash;

use indexmap::IndexMap;

use crate::types::FrameIndex;

/// Default number of frames kept by the on-demand metadata strategy.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Insertion-ordered map with a fixed entry cap.
#[derive(Debug, Clone)]
pub struct FrameCache<V, K = FrameIndex> {
    entries: IndexMap<K, V>,
    capacity: usize,
}

impl<V, K: Hash + Eq> FrameCache<V, K> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: IndexMap::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace `key`.
    ///
    /// Replacing keeps the key's original insertion position. A new key
    /// that pushes the cache past capacity evicts the oldest-inserted
    /// entry, which is returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return None;
        }
        self.entries.insert(key, value);
        if self.entries.len() > self.capacity {
            self.entries.shift_remove_index(0)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keys from oldest to newest insertion.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }
}

impl<V> Default for FrameCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
