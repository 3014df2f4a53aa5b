//! Internal storage for the request cache.
//!
//! Entries live in an `IndexMap` so insertion order doubles as recency order
//! when the cache is bounded: reads move an entry to the back, eviction takes
//! from the front.

use indexmap::IndexMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::stats::CacheStats;

/// Lock-protected map of cache entries.
///
/// This is the internal implementation; users should use `RequestCache` instead.
#[derive(Debug)]
pub(crate) struct Store<V> {
    entries: RwLock<IndexMap<String, CacheEntry<V>>>,
    config: CacheConfig,
    stats: Arc<CacheStats>,
}

impl<V: Clone> Store<V> {
    pub(crate) fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            config,
            stats: Arc::new(CacheStats::new()),
        }
    }

    pub(crate) fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a live value. An expired entry is removed on the way out.
    pub(crate) fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let value = {
            let entries = self.read_lock()?;
            match entries.get(key) {
                Some(entry) if !entry.is_expired_at(now) => Some(entry.value.clone()),
                Some(_) => None,
                None => {
                    self.stats.record_miss();
                    return None;
                }
            }
        };

        match value {
            Some(value) => {
                self.stats.record_hit();
                if self.config.max_capacity.is_some() {
                    self.promote(key);
                }
                Some(value)
            }
            None => {
                self.remove_expired(key, now);
                self.stats.record_miss();
                None
            }
        }
    }

    /// Whether a live entry exists. Does not count as a read for LRU.
    pub(crate) fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        let expired = match self.read_lock() {
            Some(entries) => match entries.get(key) {
                Some(entry) => entry.is_expired_at(now),
                None => return false,
            },
            None => return false,
        };

        if expired {
            self.remove_expired(key, now);
        }
        !expired
    }

    /// Store `value` under `key`, replacing any previous entry and its clock.
    pub(crate) fn set(&self, key: String, value: V, ttl: Duration) {
        let entry = CacheEntry::new(value, ttl);

        let Some(mut entries) = self.write_lock() else {
            return;
        };

        if let Some(max_capacity) = self.config.max_capacity {
            if !entries.contains_key(&key) {
                while entries.len() >= max_capacity {
                    self.evict_one(&mut entries);
                }
            }
        }

        // Replacing keeps the old slot; move it to the back so it counts as fresh.
        let (index, _) = entries.insert_full(key, entry);
        let last = entries.len() - 1;
        entries.move_index(index, last);
        self.stats.record_set();
    }

    pub(crate) fn remove(&self, key: &str) -> bool {
        let Some(mut entries) = self.write_lock() else {
            return false;
        };

        let existed = entries.shift_remove(key).is_some();
        if existed {
            self.stats.record_clear();
        }
        existed
    }

    pub(crate) fn clear(&self) {
        if let Some(mut entries) = self.write_lock() {
            entries.clear();
        }
    }

    /// Entry count, including entries that expired but were not read since.
    pub(crate) fn len(&self) -> usize {
        self.read_lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.read_lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Remove every expired entry, returning how many were dropped.
    pub(crate) fn cleanup_expired(&self) -> usize {
        let Some(mut entries) = self.write_lock() else {
            return 0;
        };

        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();

        if removed > 0 {
            self.stats.record_expirations(removed as u64);
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    fn read_lock(&self) -> Option<RwLockReadGuard<'_, IndexMap<String, CacheEntry<V>>>> {
        self.entries.read().ok()
    }

    fn write_lock(&self) -> Option<RwLockWriteGuard<'_, IndexMap<String, CacheEntry<V>>>> {
        self.entries.write().ok()
    }

    /// Mark `key` as most recently used.
    fn promote(&self, key: &str) {
        if let Some(mut entries) = self.write_lock() {
            if let Some(index) = entries.get_index_of(key) {
                let last = entries.len() - 1;
                entries.move_index(index, last);
            }
        }
    }

    /// Remove `key` if it is still expired; a concurrent `set` may have refreshed it.
    fn remove_expired(&self, key: &str, now: Instant) {
        if let Some(mut entries) = self.write_lock() {
            if entries.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
                entries.shift_remove(key);
                self.stats.record_expirations(1);
            }
        }
    }

    fn evict_one(&self, entries: &mut IndexMap<String, CacheEntry<V>>) {
        if let Some((key, _)) = entries.shift_remove_index(0) {
            self.stats.record_eviction();
            debug!(key = %key, "evicted least recently used cache entry");
        }
    }
}
