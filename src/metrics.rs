//! Named timing metrics.
//!
//! `PerformanceMonitor` keeps the most recent measurements in a bounded
//! ring and answers per-name averages. [`PerformanceMonitor::measure`] times
//! a fallible future; failures are recorded under `<name>-error` so they do
//! not skew the success timings.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

/// One recorded measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub recorded_at: DateTime<Utc>,
}

/// Per-name aggregate produced by [`PerformanceMonitor::report`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub count: usize,
    pub average: f64,
}

struct Inner {
    metrics: Mutex<VecDeque<Metric>>,
    capacity: usize,
    enabled: AtomicBool,
}

/// Bounded store of named measurements. Cloning shares the same store.
///
/// ```
/// use offline_resilience::PerformanceMonitor;
///
/// let monitor = PerformanceMonitor::default();
/// monitor.record("render", 12.0, "ms");
/// monitor.record("render", 18.0, "ms");
/// assert_eq!(monitor.average("render"), 15.0);
/// ```
#[derive(Clone)]
pub struct PerformanceMonitor {
    inner: Arc<Inner>,
}

impl PerformanceMonitor {
    /// Measurements kept before the oldest are discarded.
    pub const DEFAULT_CAPACITY: usize = 1000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                metrics: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                enabled: AtomicBool::new(true),
            }),
        }
    }

    /// Record a measurement. Ignored while the monitor is disabled.
    pub fn record(&self, name: impl Into<String>, value: f64, unit: &str) {
        if !self.is_enabled() {
            return;
        }
        let metric = Metric {
            name: name.into(),
            value,
            unit: unit.to_string(),
            recorded_at: Utc::now(),
        };
        debug!(name = %metric.name, value, unit, "recorded metric");

        let mut metrics = self.metrics_guard();
        if metrics.len() == self.inner.capacity {
            metrics.pop_front();
        }
        metrics.push_back(metric);
    }

    /// Record a duration in milliseconds.
    pub fn record_duration(&self, name: impl Into<String>, elapsed: Duration) {
        self.record(name, elapsed.as_secs_f64() * 1000.0, "ms");
    }

    /// Await `future`, recording its duration under `name`, or under
    /// `<name>-error` if it fails. The result is passed through untouched.
    pub async fn measure<Fut, T, E>(&self, name: &str, future: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let result = future.await;
        self.record_outcome(name, start.elapsed(), result.is_ok());
        result
    }

    /// Synchronous counterpart of [`measure`](Self::measure).
    pub fn measure_sync<T, E>(&self, name: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let start = Instant::now();
        let result = f();
        self.record_outcome(name, start.elapsed(), result.is_ok());
        result
    }

    /// Snapshot of the retained measurements, oldest first.
    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics_guard().iter().cloned().collect()
    }

    /// Mean value recorded under `name`, or `0.0` if there is none.
    pub fn average(&self, name: &str) -> f64 {
        let metrics = self.metrics_guard();
        let (sum, count) = metrics
            .iter()
            .filter(|m| m.name == name)
            .fold((0.0, 0usize), |(sum, count), m| (sum + m.value, count + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Count and average per name, in order of first appearance.
    pub fn report(&self) -> Vec<MetricSummary> {
        let metrics = self.metrics_guard();
        let mut totals: IndexMap<&str, (f64, usize)> = IndexMap::new();
        for metric in metrics.iter() {
            let total = totals.entry(metric.name.as_str()).or_insert((0.0, 0));
            total.0 += metric.value;
            total.1 += 1;
        }

        totals
            .into_iter()
            .map(|(name, (sum, count))| MetricSummary {
                name: name.to_string(),
                count,
                average: sum / count as f64,
            })
            .collect()
    }

    /// Write the report to the log, one line per name.
    pub fn log_report(&self) {
        for summary in self.report() {
            info!(
                metric = %summary.name,
                count = summary.count,
                average_ms = summary.average,
                "performance report"
            );
        }
    }

    pub fn clear(&self) {
        self.metrics_guard().clear();
    }

    pub fn len(&self) -> usize {
        self.metrics_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    fn record_outcome(&self, name: &str, elapsed: Duration, ok: bool) {
        if ok {
            self.record_duration(name, elapsed);
        } else {
            self.record_duration(format!("{}-error", name), elapsed);
        }
    }

    fn metrics_guard(&self) -> MutexGuard<'_, VecDeque<Metric>> {
        self.inner.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("len", &self.len())
            .field("capacity", &self.inner.capacity)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_keeps_most_recent() {
        let monitor = PerformanceMonitor::default();
        for i in 0..1005 {
            monitor.record("tick", i as f64, "ms");
        }

        assert_eq!(monitor.len(), PerformanceMonitor::DEFAULT_CAPACITY);
        let metrics = monitor.metrics();
        assert_eq!(metrics.first().map(|m| m.value), Some(5.0));
        assert_eq!(metrics.last().map(|m| m.value), Some(1004.0));
    }

    #[test]
    fn test_average_per_name() {
        let monitor = PerformanceMonitor::default();
        monitor.record("a", 10.0, "ms");
        monitor.record("b", 100.0, "ms");
        monitor.record("a", 20.0, "ms");

        assert_eq!(monitor.average("a"), 15.0);
        assert_eq!(monitor.average("b"), 100.0);
        assert_eq!(monitor.average("missing"), 0.0);
    }

    #[test]
    fn test_report_in_first_seen_order() {
        let monitor = PerformanceMonitor::default();
        monitor.record("load", 4.0, "ms");
        monitor.record("save", 1.0, "ms");
        monitor.record("load", 6.0, "ms");

        let report = monitor.report();
        assert_eq!(
            report,
            vec![
                MetricSummary { name: "load".into(), count: 2, average: 5.0 },
                MetricSummary { name: "save".into(), count: 1, average: 1.0 },
            ]
        );
    }

    #[test]
    fn test_clear_and_disable() {
        let monitor = PerformanceMonitor::with_capacity(10);
        monitor.record("a", 1.0, "ms");
        monitor.clear();
        assert!(monitor.is_empty());

        monitor.set_enabled(false);
        monitor.record("a", 1.0, "ms");
        assert!(monitor.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_records_elapsed_time() {
        let monitor = PerformanceMonitor::default();

        let result: Result<u32, String> = monitor
            .measure("fetch", async {
                tokio::time::sleep(Duration::from_millis(250)).await;
                Ok(7)
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(monitor.average("fetch"), 250.0);
    }

    #[tokio::test]
    async fn test_measure_failure_uses_error_name() {
        let monitor = PerformanceMonitor::default();

        let result: Result<(), &str> = monitor.measure("fetch", async { Err("down") }).await;

        assert_eq!(result, Err("down"));
        let names: Vec<String> = monitor.metrics().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["fetch-error".to_string()]);
        assert_eq!(monitor.metrics()[0].unit, "ms");
    }

    #[test]
    fn test_measure_sync() {
        let monitor = PerformanceMonitor::default();

        assert_eq!(monitor.measure_sync("parse", || "42".parse::<u32>()).ok(), Some(42));
        assert!(monitor.measure_sync("parse", || "x".parse::<u32>()).is_err());

        let names: Vec<String> = monitor.metrics().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["parse".to_string(), "parse-error".to_string()]);
    }
}
