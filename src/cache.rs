//! Strict LRU cache of analysis results keyed by the raw input.
//!
//! A hit moves the entry to the most recently used position; inserting
//! into a full cache evicts the least recently used entry. A capacity of 0
//! disables caching: every lookup misses and nothing is stored.

use std::collections::{BTreeMap, HashMap};

/// Cache performance statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0.0 without lookups.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct LruCache<V> {
    capacity: usize,
    /// Value and the tick of its last use.
    entries: HashMap<String, (V, u64)>,
    /// Last-use tick to key; the first entry is the least recently used.
    order: BTreeMap<u64, String>,
    tick: u64,
    stats: CacheStats,
}

impl<V: Clone> LruCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: BTreeMap::new(),
            tick: 0,
            stats: CacheStats::default(),
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

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        let tick = self.next_tick();
        match self.entries.get_mut(key) {
            Some((value, last_used)) => {
                self.stats.hits += 1;
                let previous = std::mem::replace(last_used, tick);
                let value = value.clone();
                if let Some(key) = self.order.remove(&previous) {
                    self.order.insert(tick, key);
                }
                Some(value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: &str, value: V) {
        if self.capacity == 0 {
            return;
        }
        let tick = self.next_tick();
        if let Some((_, previous)) = self.entries.insert(key.to_string(), (value, tick)) {
            self.order.remove(&previous);
        }
        self.order.insert(tick, key.to_string());
        while self.entries.len() > self.capacity {
            match self.order.pop_first() {
                Some((_, oldest)) => {
                    self.entries.remove(&oldest);
                    self.stats.evictions += 1;
                }
                None => break,
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_least_recently_used_is_evicted() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get("a"), Some(1));

        cache.insert("c", 3);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.len(), 2);

        let stats = cache.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert!((stats.hit_ratio() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reinsert_refreshes_entry() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        cache.insert("c", 3);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_hits_keep_recency_across_many_entries() {
        let mut cache = LruCache::new(1_000);
        for i in 0..1_000 {
            cache.insert(&format!("key{i}"), i);
        }
        for _ in 0..10 {
            for i in (0..500).rev() {
                assert_eq!(cache.get(&format!("key{i}")), Some(i));
            }
        }

        // The untouched upper half goes first, oldest insert first.
        for i in 1_000..1_500 {
            cache.insert(&format!("key{i}"), i);
        }
        assert_eq!(cache.len(), 1_000);
        assert_eq!(cache.get("key999"), None);
        assert_eq!(cache.get("key500"), None);
        assert_eq!(cache.get("key0"), Some(0));
        assert_eq!(cache.get("key1499"), Some(1_499));
        assert_eq!(cache.stats().evictions, 500);
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let mut cache = LruCache::new(0);
        cache.insert("a", 1);
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.stats().evictions, 0);
    }
}
