//! Configuration for the offline-resilience components.
//!
//! Each component takes a small builder-style config. The TTL tiers let call
//! sites pick an expiry by how volatile their data is instead of inventing
//! durations.

use std::time::Duration;

/// Named TTL tiers for cached reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlTier {
    /// 2 minutes - frequently changing data.
    Short,
    /// 5 minutes - standard data.
    Medium,
    /// 15 minutes - user profile, settings.
    Long,
    /// 30 minutes - reference data such as city lists.
    VeryLong,
}

impl TtlTier {
    pub const SHORT: Duration = Duration::from_secs(2 * 60);
    pub const MEDIUM: Duration = Duration::from_secs(5 * 60);
    pub const LONG: Duration = Duration::from_secs(15 * 60);
    pub const VERY_LONG: Duration = Duration::from_secs(30 * 60);

    /// The duration for this tier.
    pub fn duration(self) -> Duration {
        match self {
            TtlTier::Short => Self::SHORT,
            TtlTier::Medium => Self::MEDIUM,
            TtlTier::Long => Self::LONG,
            TtlTier::VeryLong => Self::VERY_LONG,
        }
    }

    /// Parse a tier name (case-insensitive). Accepts `very-long` and `very_long`.
    pub fn parse(s: &str) -> Option<TtlTier> {
        match s.to_lowercase().as_str() {
            "short" => Some(TtlTier::Short),
            "medium" => Some(TtlTier::Medium),
            "long" => Some(TtlTier::Long),
            "very-long" | "very_long" | "verylong" => Some(TtlTier::VeryLong),
            _ => None,
        }
    }
}

impl From<TtlTier> for Duration {
    fn from(tier: TtlTier) -> Self {
        tier.duration()
    }
}

/// Configuration for a [`RequestCache`](crate::RequestCache).
///
/// ```
/// use offline_resilience::{CacheConfig, TtlTier};
///
/// let config = CacheConfig::new()
///     .max_capacity(500)
///     .default_ttl(TtlTier::Long.duration())
///     .build();
/// assert_eq!(config.get_max_capacity(), Some(500));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries. `None` means unbounded, relying on callers
    /// to keep the key space small.
    pub(crate) max_capacity: Option<usize>,

    /// TTL used by `set` when no explicit TTL is given.
    pub(crate) default_ttl: Duration,

    /// Interval for the optional background sweep.
    pub(crate) cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: None,
            default_ttl: TtlTier::MEDIUM,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the cache to `capacity` entries, evicting the least recently
    /// used entry when full. Use 0 for unbounded.
    pub fn max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = if capacity == 0 { None } else { Some(capacity) };
        self
    }

    /// Set the TTL used when `set` is called without one.
    /// A zero duration falls back to the medium tier.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = if ttl.is_zero() { TtlTier::MEDIUM } else { ttl };
        self
    }

    /// Interval between sweeps when a sweeper is spawned.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.cleanup_interval = interval;
        }
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Self {
        self
    }

    pub fn get_max_capacity(&self) -> Option<usize> {
        self.max_capacity
    }

    pub fn get_default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn get_cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }
}

/// Configuration for an [`OfflineQueue`](crate::OfflineQueue).
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// A request is dropped once its retry count exceeds this value.
    pub(crate) max_retries: u32,
}

impl QueueConfig {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn build(self) -> Self {
        self
    }

    pub fn get_max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
        }
    }
}

/// Configuration for a [`DebouncedAction`](crate::DebouncedAction).
#[derive(Debug, Clone)]
pub struct DebounceConfig {
    pub(crate) delay: Duration,
}

impl DebounceConfig {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

    pub fn new() -> Self {
        Self::default()
    }

    /// Quiet period that must follow the last `execute` before the action runs.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn build(self) -> Self {
        self
    }

    pub fn get_delay(&self) -> Duration {
        self.delay
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay: Self::DEFAULT_DELAY,
        }
    }
}

/// Tuning values for mobile hosts, where every request costs battery.
pub struct MobileProfile;

impl MobileProfile {
    /// Debounce for favorite toggles.
    pub const FAVORITES_DEBOUNCE: Duration = Duration::from_millis(300);
    /// Longer TTL for data refreshed less often on mobile.
    pub const DATA_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
    pub const BATCH_REQUEST_DELAY: Duration = Duration::from_millis(1000);
    pub const MAX_BATCH_SIZE: usize = 100;
    /// Timeout executors should impose on poor networks.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const PREFETCH_ON_RECONNECT: bool = true;

    /// Cache config with the mobile data TTL as default.
    pub fn cache_config() -> CacheConfig {
        CacheConfig::new().default_ttl(Self::DATA_CACHE_TTL).build()
    }

    /// Debounce config for favorite toggles.
    pub fn favorites_debounce() -> DebounceConfig {
        DebounceConfig::new().delay(Self::FAVORITES_DEBOUNCE).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert!(config.max_capacity.is_none());
        assert_eq!(config.default_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_builder_pattern() {
        let config = CacheConfig::new()
            .max_capacity(1000)
            .default_ttl(Duration::from_secs(60))
            .cleanup_interval(Duration::from_secs(5))
            .build();

        assert_eq!(config.max_capacity, Some(1000));
        assert_eq!(config.default_ttl, Duration::from_secs(60));
        assert_eq!(config.cleanup_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_capacity_means_unbounded() {
        let config = CacheConfig::new().max_capacity(0).build();
        assert!(config.max_capacity.is_none());
    }

    #[test]
    fn test_zero_ttl_falls_back_to_medium() {
        let config = CacheConfig::new().default_ttl(Duration::ZERO).build();
        assert_eq!(config.default_ttl, TtlTier::MEDIUM);
    }

    #[test]
    fn test_tiers_are_ordered() {
        assert!(TtlTier::Short.duration() < TtlTier::Medium.duration());
        assert!(TtlTier::Medium.duration() < TtlTier::Long.duration());
        assert!(TtlTier::Long.duration() < TtlTier::VeryLong.duration());
        assert_eq!(Duration::from(TtlTier::VeryLong), Duration::from_secs(1800));
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!(TtlTier::parse("SHORT"), Some(TtlTier::Short));
        assert_eq!(TtlTier::parse("very-long"), Some(TtlTier::VeryLong));
        assert_eq!(TtlTier::parse("forever"), None);
    }

    #[test]
    fn test_queue_and_debounce_defaults() {
        assert_eq!(QueueConfig::default().get_max_retries(), 3);
        assert_eq!(DebounceConfig::default().get_delay(), Duration::from_millis(500));
        assert_eq!(
            MobileProfile::favorites_debounce().get_delay(),
            Duration::from_millis(300)
        );
    }
}
