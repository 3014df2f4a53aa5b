//! Counters for the request cache.
//!
//! All counters are atomic, so recording never contends with the map lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for cache operations.
///
/// Use `RequestCache::stats()` to get a snapshot.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Reads that returned a live value.
    hits: AtomicU64,

    /// Reads that found nothing or an expired entry.
    misses: AtomicU64,

    /// Entries removed to stay within `max_capacity`.
    evictions: AtomicU64,

    /// Entries removed because their TTL elapsed.
    expirations: AtomicU64,

    /// Every `set`, including overwrites.
    sets: AtomicU64,

    /// Explicit single-key clears that removed something.
    clears: AtomicU64,
}

impl CacheStats {
    /// Create a new stats instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read that returned a live value.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a read that returned nothing.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an LRU eviction.
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `count` entries dropped for an elapsed TTL.
    pub fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a store operation.
    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a single-key clear that removed an entry.
    pub fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of hits.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get the number of misses.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get the number of LRU evictions.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get the number of expired entries removed.
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Get the number of store operations.
    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    /// Get the number of single-key clears.
    pub fn clears(&self) -> u64 {
        self.clears.load(Ordering::Relaxed)
    }

    /// Hit rate as a percentage (0.0 to 100.0), 0.0 before any read.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    /// Take a snapshot. `size` comes from the map, not from a counter.
    pub fn snapshot(&self, size: usize) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            expirations: self.expirations(),
            sets: self.sets(),
            clears: self.clears(),
            size: size as u64,
            hit_rate: self.hit_rate(),
        }
    }
}

/// A point-in-time copy of the cache statistics.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub sets: u64,
    pub clears: u64,
    pub size: u64,
    pub hit_rate: f64,
}
