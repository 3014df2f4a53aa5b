//! Cache entry with the metadata needed for TTL expiry.

use std::time::Duration;
use tokio::time::Instant;

/// A single cache entry containing the value and its expiry metadata.
///
/// An entry is visible only while `now - stored_at < ttl`.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value.
    pub(crate) value: V,

    /// When the entry was stored. Overwriting resets it.
    pub(crate) stored_at: Instant,

    /// How long the entry stays valid after `stored_at`.
    pub(crate) ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Create an entry stored now.
    pub fn new(value: V, ttl: Duration) -> Self {
        Self::stored_at(value, ttl, Instant::now())
    }

    /// Create an entry stored at a given instant.
    /// This is useful for testing with a controlled clock.
    pub fn stored_at(value: V, ttl: Duration, now: Instant) -> Self {
        Self {
            value,
            stored_at: now,
            ttl,
        }
    }

    /// Check if this entry has expired at a given time.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) >= self.ttl
    }
}
