//! # Offline Resilience
//!
//! Small client-side building blocks that cut redundant requests and survive
//! flaky connectivity on mobile hosts.
//!
//! ## Components
//!
//! - **[`RequestCache`]**: in-memory key/value cache with per-entry TTL and
//!   four named TTL tiers. Expiry is lazy, checked on read.
//! - **[`DebouncedAction`]**: collapses bursts of calls to an async action
//!   into one trailing run with the latest arguments.
//! - **[`NetworkMonitor`]**: online/offline state with de-duplicated
//!   transition notifications.
//! - **[`OfflineQueue`]**: FIFO of writes made while offline, replayed
//!   against a caller-supplied executor with a retry ceiling.
//!
//! Plus [`Throttle`], [`RequestBatcher`] and [`RequestDeduplicator`] for the
//! other common ways of keeping request volume down, and
//! [`PerformanceMonitor`] for timing named operations.
//!
//! Every component is constructed explicitly and shared by cloning a handle;
//! there are no globals. Subscriptions return a [`Subscription`] guard that
//! unregisters on drop.
//!
//! ## Quick Start
//!
//! ```rust
//! use offline_resilience::{NetworkMonitor, OfflineQueue, RequestCache, TtlTier};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache: RequestCache<String> = RequestCache::default();
//! cache.set_tier("profile:42", "Alice".to_string(), TtlTier::Long);
//! assert_eq!(cache.get("profile:42").as_deref(), Some("Alice"));
//!
//! let monitor = NetworkMonitor::new(false);
//! let queue = OfflineQueue::default();
//! queue.enqueue("create", json!({ "name": "X" }));
//!
//! monitor.set_online(true);
//! if monitor.get_is_online() {
//!     let report = queue
//!         .sync_all(|_action, _payload| async { Ok::<_, String>(()) })
//!         .await;
//!     assert_eq!(report.synced(), 1);
//! }
//! assert_eq!(queue.size(), 0);
//! # }
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod debounce;
pub mod dedup;
pub mod error;
pub mod metrics;
pub mod network;
pub mod queue;
pub mod stats;
pub mod subscription;

pub use batch::RequestBatcher;
pub use cache::RequestCache;
pub use config::{CacheConfig, DebounceConfig, MobileProfile, QueueConfig, TtlTier};
pub use debounce::{DebouncedAction, DebouncedActionBuilder, Throttle};
pub use dedup::RequestDeduplicator;
pub use error::{OfflineError, OfflineResult};
pub use metrics::{Metric, MetricSummary, PerformanceMonitor};
pub use network::{NetworkMonitor, NetworkSignal};
pub use queue::{OfflineQueue, QueuedRequest, SyncOutcome, SyncReport, SyncResult, SyncStatus};
pub use stats::{CacheStats, StatsSnapshot};
pub use subscription::Subscription;

// Internal modules - not part of public API
pub(crate) mod entry;
pub(crate) mod storage;

// Control server surface, used by the server/client binaries
pub mod cli;
pub mod command;
pub mod control;
pub mod utils;

pub use command::{Command, Request};
pub use control::ControlService;
pub use utils::buffer_to_line;
