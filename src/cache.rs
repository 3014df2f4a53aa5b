//! The request cache.
//!
//! `RequestCache` memoizes the results of slow reads for a bounded time so
//! repeated renders and navigations do not hit the backend again. Expiry is
//! lazy: an entry is checked when it is read and removed if stale.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{CacheConfig, TtlTier};
use crate::stats::{CacheStats, StatsSnapshot};
use crate::storage::Store;

/// A thread-safe, in-memory key/value cache with per-entry TTL.
///
/// Cloning a `RequestCache` creates a new handle to the same entries, so one
/// instance can be constructed at startup and handed to every call site.
///
/// # Example
/// ```
/// use offline_resilience::{RequestCache, TtlTier};
///
/// let cache: RequestCache<Vec<String>> = RequestCache::default();
///
/// cache.set_tier("cities", vec!["Riyadh".to_string()], TtlTier::VeryLong);
/// assert_eq!(cache.get("cities").map(|c| c.len()), Some(1));
///
/// cache.clear("cities");
/// assert!(cache.get("cities").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct RequestCache<V> {
    store: Arc<Store<V>>,
}

impl<V: Clone> RequestCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: Arc::new(Store::new(config)),
        }
    }

    /// Get a value if it is present and unexpired.
    ///
    /// A miss is a normal outcome. If the entry had expired it is removed,
    /// which `size()` reflects afterwards.
    pub fn get(&self, key: &str) -> Option<V> {
        self.store.get(key)
    }

    /// Store a value with the configured default TTL (medium tier unless changed).
    pub fn set(&self, key: impl Into<String>, value: V) {
        let ttl = self.store.config().default_ttl;
        self.store.set(key.into(), value, ttl);
    }

    /// Store a value with an explicit TTL, overwriting any previous entry and
    /// restarting its clock.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.store.set(key.into(), value, ttl);
    }

    /// Store a value with the TTL of a named tier.
    pub fn set_tier(&self, key: impl Into<String>, value: V, tier: TtlTier) {
        self.store.set(key.into(), value, tier.duration());
    }

    /// Remove one entry. Returns `true` if it existed.
    pub fn clear(&self, key: &str) -> bool {
        self.store.remove(key)
    }

    /// Remove every entry, e.g. on logout or a server-side invalidation.
    pub fn clear_all(&self) {
        self.store.clear();
        debug!("request cache cleared");
    }

    /// Number of stored entries, including stale ones not yet read.
    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether a live entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    /// Keys in recency order, least recent first.
    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }

    pub fn config(&self) -> &CacheConfig {
        self.store.config()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.store.stats().snapshot(self.size())
    }

    /// The live counters, for wiring into an external metrics system.
    pub fn stats_ref(&self) -> Arc<CacheStats> {
        self.store.stats()
    }

    /// Remove every expired entry now. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        self.store.cleanup_expired()
    }

    /// Return the cached value for `key`, or await `fetcher` and cache its
    /// result for `ttl`.
    ///
    /// Fetch errors are returned untouched and nothing is cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, ttl: Duration, fetcher: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = fetcher().await?;
        self.set_with_ttl(key, value.clone(), ttl);
        Ok(value)
    }

    /// Drop any cached value for `key` and fetch a fresh one.
    pub async fn refetch<F, Fut, E>(&self, key: &str, ttl: Duration, fetcher: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.clear(key);
        self.get_or_fetch(key, ttl, fetcher).await
    }
}

impl<V: Clone + Send + Sync + 'static> RequestCache<V> {
    /// Spawn a task that sweeps expired entries every `cleanup_interval`.
    ///
    /// The task holds only a weak reference and exits once every handle to
    /// the cache has been dropped. Must be called inside a tokio runtime.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let store: Weak<Store<V>> = Arc::downgrade(&self.store);
        let period = self.store.config().cleanup_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;

            loop {
                interval.tick().await;
                match store.upgrade() {
                    Some(store) => {
                        store.cleanup_expired();
                    }
                    None => break,
                }
            }
            debug!("cache sweeper stopped");
        })
    }
}

impl<V: Clone> Default for RequestCache<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
