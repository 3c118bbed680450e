//! Keyed cache of reusable payload sets
//!
//! # Design
//!
//! - DashMap: sharded by cache key, lookups on distinct keys never contend
//! - Arc<Mutex<T>>: one in-flight pass per key, the lock is held for the
//!   whole hydrate/evaluate/extract/clear cycle
//! - Bounded: when full, an idle entry (not held by any caller) is evicted
//!
//! Entries are created lazily on first use and live until invalidated,
//! cleared or evicted. Invalidating a key mid-pass lets a second pass start
//! on a fresh entry while the first finishes on the old one; callers keep any
//! per-pass state keyed by pass, not by cache key.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// Bounded map from cache key to a lockable entry
pub struct PreprocessCache<T> {
    entries: DashMap<String, Arc<Mutex<T>>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<T> PreprocessCache<T> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Fetch the entry for `key`, building it on first use
    pub fn get_or_insert_with(&self, key: &str, build: impl FnOnce() -> T) -> Arc<Mutex<T>> {
        if let Some(entry) = self.entries.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(entry.value());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        if self.entries.len() >= self.max_entries {
            self.evict_idle();
        }
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(build())));
        Arc::clone(entry.value())
    }

    /// Existing entry for `key`
    pub fn get(&self, key: &str) -> Option<Arc<Mutex<T>>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop the entry for `key`; callers holding it keep their copy
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    // An entry is idle when the map holds the only reference to it.
    fn evict_idle(&self) {
        let victim = self
            .entries
            .iter()
            .find(|entry| Arc::strong_count(entry.value()) == 1)
            .map(|entry| entry.key().clone());
        match victim {
            Some(key) => {
                self.entries.remove(&key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "mongorules::cache",
                    cache_key = %key,
                    max_entries = self.max_entries,
                    "Evicted idle preprocess cache entry"
                );
            }
            None => tracing::warn!(
                target: "mongorules::cache",
                max_entries = self.max_entries,
                "Preprocess cache full and every entry is in use"
            ),
        }
    }
}
