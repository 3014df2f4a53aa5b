//! Offline write queue.
//!
//! Writes that could not reach the backend are buffered here as
//! [`QueuedRequest`]s and replayed in enqueue order by [`OfflineQueue::sync_all`]
//! against a caller-supplied executor. A failed replay bumps the request's
//! retry count; once the count exceeds the configured ceiling the request is
//! dropped for good.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::network::NetworkMonitor;
use crate::subscription::{Listeners, Subscription};

/// A buffered write waiting to be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    /// Unique id: `<action>-<unix millis>-<random hex>`.
    pub id: String,
    /// Logical operation name the executor dispatches on.
    pub action: String,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    /// Failed replay attempts so far.
    pub retry_count: u32,
}

/// How a `sync_all` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The snapshot was processed.
    Completed,
    /// Another pass was running; nothing was done.
    AlreadySyncing,
    /// The queue was empty; nothing was done.
    Empty,
}

/// What happened to one request during a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The executor succeeded and the request was removed.
    Synced,
    /// The executor failed; the request stays queued.
    Retrying { retry_count: u32, error: String },
    /// The executor failed past the retry ceiling; the request was removed.
    Dropped { retry_count: u32, error: String },
    /// The request was removed from the queue before its turn came.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult {
    pub id: String,
    pub action: String,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// Summary of one `sync_all` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub results: Vec<SyncResult>,
}

impl SyncReport {
    fn with_status(status: SyncStatus) -> Self {
        Self {
            status,
            results: Vec::new(),
        }
    }

    pub fn synced(&self) -> usize {
        self.count(|outcome| matches!(outcome, SyncOutcome::Synced))
    }

    pub fn retrying(&self) -> usize {
        self.count(|outcome| matches!(outcome, SyncOutcome::Retrying { .. }))
    }

    pub fn dropped(&self) -> usize {
        self.count(|outcome| matches!(outcome, SyncOutcome::Dropped { .. }))
    }

    fn count(&self, pred: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

struct Inner {
    entries: Mutex<IndexMap<String, QueuedRequest>>,
    syncing: AtomicBool,
    listeners: Arc<Listeners<Vec<QueuedRequest>>>,
    dropped: Arc<Listeners<QueuedRequest>>,
    config: QueueConfig,
}

/// Clears the syncing flag when a pass ends, including when its future is dropped.
struct SyncGate<'a>(&'a AtomicBool);

impl<'a> SyncGate<'a> {
    fn try_begin(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGate(flag))
    }
}

impl Drop for SyncGate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// In-memory FIFO of pending writes.
///
/// Cloning shares the same queue.
///
/// ```
/// use offline_resilience::OfflineQueue;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = OfflineQueue::default();
/// queue.enqueue("create", json!({ "name": "X" }));
///
/// let report = queue
///     .sync_all(|action, _payload| async move {
///         assert_eq!(action, "create");
///         Ok::<_, String>(())
///     })
///     .await;
///
/// assert_eq!(report.synced(), 1);
/// assert_eq!(queue.size(), 0);
/// # }
/// ```
#[derive(Clone)]
pub struct OfflineQueue {
    inner: Arc<Inner>,
}

impl OfflineQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(IndexMap::new()),
                syncing: AtomicBool::new(false),
                listeners: Listeners::new(),
                dropped: Listeners::new(),
                config,
            }),
        }
    }

    /// Append a write. Returns its id so a superseded write can be removed.
    pub fn enqueue(&self, action: impl Into<String>, payload: Value) -> String {
        let action = action.into();
        let enqueued_at = Utc::now();

        let id = {
            let mut entries = self.entries();
            let mut id = generate_id(&action, enqueued_at);
            while entries.contains_key(&id) {
                id = generate_id(&action, enqueued_at);
            }
            entries.insert(
                id.clone(),
                QueuedRequest {
                    id: id.clone(),
                    action: action.clone(),
                    payload,
                    enqueued_at,
                    retry_count: 0,
                },
            );
            id
        };

        info!(action = %action, id = %id, "queued offline request");
        self.notify();
        id
    }

    /// Replay a snapshot of the queue through `executor`, one request at a
    /// time in enqueue order.
    ///
    /// Only one pass runs at a time; a call made while another is in flight
    /// returns immediately with [`SyncStatus::AlreadySyncing`]. Requests
    /// enqueued during a pass wait for the next one. Subscribers are notified
    /// once the pass finishes.
    pub async fn sync_all<F, Fut, T, E>(&self, mut executor: F) -> SyncReport
    where
        F: FnMut(String, Value) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let Some(_gate) = SyncGate::try_begin(&self.inner.syncing) else {
            debug!("offline sync already in progress");
            return SyncReport::with_status(SyncStatus::AlreadySyncing);
        };

        let snapshot = self.get_queue();
        if snapshot.is_empty() {
            return SyncReport::with_status(SyncStatus::Empty);
        }

        info!(pending = snapshot.len(), "starting offline sync");
        let mut report = SyncReport::with_status(SyncStatus::Completed);

        for request in snapshot {
            let outcome = if !self.entries().contains_key(&request.id) {
                SyncOutcome::Skipped
            } else {
                match executor(request.action.clone(), request.payload.clone()).await {
                    Ok(_) => {
                        self.entries().shift_remove(&request.id);
                        debug!(action = %request.action, id = %request.id, "synced queued request");
                        SyncOutcome::Synced
                    }
                    Err(err) => self.record_failure(&request.id, err.to_string()),
                }
            };

            report.results.push(SyncResult {
                id: request.id,
                action: request.action,
                outcome,
            });
        }

        info!(
            synced = report.synced(),
            retrying = report.retrying(),
            dropped = report.dropped(),
            "offline sync finished"
        );
        self.notify();
        report
    }

    /// Replay the queue every time `monitor` reports the host back online.
    ///
    /// The task ends when every handle to the monitor is dropped. Must be
    /// called inside a tokio runtime.
    pub fn sync_on_reconnect<F, Fut, T, E>(&self, monitor: &NetworkMonitor, mut executor: F) -> JoinHandle<()>
    where
        F: FnMut(String, Value) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: fmt::Display + Send,
    {
        let queue = self.clone();
        let mut online = monitor.watch();

        tokio::spawn(async move {
            loop {
                let is_online = *online.borrow_and_update();
                if is_online {
                    queue.sync_all(&mut executor).await;
                }
                if online.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Snapshot of the pending requests in enqueue order.
    pub fn get_queue(&self) -> Vec<QueuedRequest> {
        self.entries().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<QueuedRequest> {
        self.entries().get(id).cloned()
    }

    /// Remove one request. Returns `true` if it was queued.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.entries().shift_remove(id).is_some();
        self.notify();
        removed
    }

    pub fn clear(&self) {
        self.entries().clear();
        self.notify();
    }

    pub fn size(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::Acquire)
    }

    /// Register a callback that receives the full queue after every mutation.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[QueuedRequest]) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .add(move |queue: &Vec<QueuedRequest>| callback(queue.as_slice()))
    }

    /// Register a callback for requests dropped after exhausting their retries.
    pub fn on_dropped<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&QueuedRequest) + Send + Sync + 'static,
    {
        self.inner.dropped.add(callback)
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    fn record_failure(&self, id: &str, error: String) -> SyncOutcome {
        let max_retries = self.inner.config.max_retries;

        let dropped = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(id) else {
                // Removed by the caller while the executor was running.
                return SyncOutcome::Skipped;
            };
            entry.retry_count += 1;
            let retry_count = entry.retry_count;

            if retry_count > max_retries {
                entries.shift_remove(id)
            } else {
                warn!(action = %entry.action, id, retry_count, error = %error, "queued request failed, will retry");
                return SyncOutcome::Retrying { retry_count, error };
            }
        };

        match dropped {
            Some(request) => {
                error!(
                    action = %request.action,
                    id,
                    retries = max_retries,
                    error = %error,
                    "dropping queued request after exhausting retries"
                );
                let retry_count = request.retry_count;
                self.inner.dropped.notify(&request);
                SyncOutcome::Dropped { retry_count, error }
            }
            None => SyncOutcome::Skipped,
        }
    }

    fn notify(&self) {
        let queue = self.get_queue();
        self.inner.listeners.notify(&queue);
    }

    fn entries(&self) -> MutexGuard<'_, IndexMap<String, QueuedRequest>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for OfflineQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("size", &self.size())
            .field("syncing", &self.is_syncing())
            .field("max_retries", &self.inner.config.max_retries)
            .finish()
    }
}

fn generate_id(action: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}-{:08x}", action, at.timestamp_millis(), rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    async fn always_fail(_action: String, _payload: Value) -> Result<(), String> {
        Err("backend unavailable".to_string())
    }

    async fn always_succeed(_action: String, _payload: Value) -> Result<(), String> {
        Ok(())
    }

    fn actions(queue: &OfflineQueue) -> Vec<String> {
        queue.get_queue().into_iter().map(|r| r.action).collect()
    }

    #[test]
    fn test_enqueue_assigns_unique_ids() {
        let queue = OfflineQueue::default();
        let a = queue.enqueue("favorite", json!({ "id": 1 }));
        let b = queue.enqueue("favorite", json!({ "id": 1 }));

        assert_ne!(a, b);
        assert!(a.starts_with("favorite-"));
        assert_eq!(queue.size(), 2);

        let request = queue.get(&a).unwrap();
        assert_eq!(request.retry_count, 0);
        assert_eq!(request.payload, json!({ "id": 1 }));
    }

    #[test]
    fn test_remove_and_clear_notify() {
        let queue = OfflineQueue::default();
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        let _sub = queue.subscribe(move |q| sink.lock().unwrap().push(q.len()));

        let id = queue.enqueue("a", Value::Null);
        queue.enqueue("b", Value::Null);
        assert!(queue.remove(&id));
        assert!(!queue.remove(&id));
        queue.clear();

        assert_eq!(*sizes.lock().unwrap(), vec![1, 2, 1, 1, 0]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_success_removes_entry() {
        let queue = OfflineQueue::default();
        let last = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&last);
        let _sub = queue.subscribe(move |q| *sink.lock().unwrap() = Some(q.to_vec()));

        let id = queue.enqueue("create", json!({ "name": "X" }));
        let report = queue.sync_all(always_succeed).await;

        assert_eq!(report.status, SyncStatus::Completed);
        assert_eq!(report.synced(), 1);
        assert_eq!(queue.size(), 0);

        let seen = last.lock().unwrap().clone().unwrap();
        assert!(seen.iter().all(|r| r.id != id));
    }

    #[tokio::test]
    async fn test_fifo_and_retry_ceiling() {
        let queue = OfflineQueue::default();
        queue.enqueue("A", Value::Null);
        queue.enqueue("B", Value::Null);
        queue.enqueue("C", Value::Null);

        let report = queue.sync_all(always_fail).await;
        assert_eq!(report.retrying(), 3);
        assert_eq!(actions(&queue), vec!["A", "B", "C"]);
        assert!(queue.get_queue().iter().all(|r| r.retry_count == 1));

        queue.sync_all(always_fail).await;
        queue.sync_all(always_fail).await;
        assert_eq!(queue.size(), 3);

        let report = queue.sync_all(always_fail).await;
        assert_eq!(report.dropped(), 3);
        assert_eq!(queue.size(), 0);
    }

    #[tokio::test]
    async fn test_executor_sees_enqueue_order() {
        let queue = OfflineQueue::default();
        for name in ["first", "second", "third"] {
            queue.enqueue(name, Value::Null);
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        queue
            .sync_all(move |action, _| {
                sink.lock().unwrap().push(action);
                async { Ok::<_, String>(()) }
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_mixed_results() {
        let queue = OfflineQueue::default();
        queue.enqueue("ok", Value::Null);
        queue.enqueue("bad", Value::Null);

        let report = queue
            .sync_all(|action, _| async move {
                if action == "ok" {
                    Ok(())
                } else {
                    Err(format!("unknown action: {}", action))
                }
            })
            .await;

        assert_eq!(report.synced(), 1);
        assert_eq!(
            report.results[1].outcome,
            SyncOutcome::Retrying {
                retry_count: 1,
                error: "unknown action: bad".to_string()
            }
        );
        assert_eq!(actions(&queue), vec!["bad"]);
    }

    #[tokio::test]
    async fn test_empty_queue_is_noop() {
        let queue = OfflineQueue::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let report = queue
            .sync_all(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, String>(()) }
            })
            .await;

        assert_eq!(report.status, SyncStatus::Empty);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!queue.is_syncing());
    }

    #[tokio::test]
    async fn test_concurrent_sync_is_rejected() {
        let queue = OfflineQueue::default();
        queue.enqueue("slow", Value::Null);

        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = {
            let queue = queue.clone();
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                queue
                    .sync_all(move |_, _| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let started = Arc::clone(&started);
                        let release = Arc::clone(&release);
                        async move {
                            started.notify_one();
                            release.notified().await;
                            Ok::<_, String>(())
                        }
                    })
                    .await
            })
        };

        started.notified().await;
        assert!(queue.is_syncing());

        let second = queue.sync_all(always_succeed).await;
        assert_eq!(second.status, SyncStatus::AlreadySyncing);

        release.notify_one();
        let first = first.await.unwrap();
        assert_eq!(first.synced(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!queue.is_syncing());
    }

    #[tokio::test]
    async fn test_enqueue_during_sync_waits_for_next_pass() {
        let queue = OfflineQueue::default();
        queue.enqueue("before", Value::Null);

        let inner = queue.clone();
        let report = queue
            .sync_all(move |action, _| {
                if action == "before" {
                    inner.enqueue("during", Value::Null);
                }
                async { Ok::<_, String>(()) }
            })
            .await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(actions(&queue), vec!["during"]);
    }

    #[tokio::test]
    async fn test_removed_before_turn_is_skipped() {
        let queue = OfflineQueue::default();
        queue.enqueue("first", Value::Null);
        let second = queue.enqueue("second", Value::Null);

        let inner = queue.clone();
        let executed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&executed);
        let report = queue
            .sync_all(move |action, _| {
                inner.remove(&second);
                sink.lock().unwrap().push(action);
                async { Ok::<_, String>(()) }
            })
            .await;

        assert_eq!(*executed.lock().unwrap(), vec!["first"]);
        assert_eq!(report.results[1].outcome, SyncOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_on_dropped_reports_terminal_failures() {
        let queue = OfflineQueue::new(QueueConfig::new().max_retries(0).build());
        let dropped = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&dropped);
        let _sub = queue.on_dropped(move |r| sink.lock().unwrap().push(r.action.clone()));

        queue.enqueue("doomed", Value::Null);
        let report = queue.sync_all(always_fail).await;

        assert_eq!(report.dropped(), 1);
        assert_eq!(*dropped.lock().unwrap(), vec!["doomed"]);
    }

    #[tokio::test]
    async fn test_sync_on_reconnect() {
        let queue = OfflineQueue::default();
        let monitor = NetworkMonitor::new(false);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let task = queue.sync_on_reconnect(&monitor, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(()) }
        });

        queue.enqueue("create", json!({ "name": "X" }));
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        monitor.set_online(true);
        for _ in 0..10 {
            if queue.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(queue.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(monitor);
        task.await.unwrap();
    }

    #[test]
    fn test_report_serializes_outcomes() {
        let report = SyncReport {
            status: SyncStatus::Completed,
            results: vec![SyncResult {
                id: "x-1-0".to_string(),
                action: "x".to_string(),
                outcome: SyncOutcome::Retrying {
                    retry_count: 2,
                    error: "timeout".to_string(),
                },
            }],
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["results"][0]["outcome"], "retrying");
        assert_eq!(value["results"][0]["retry_count"], 2);
    }
}
