//! Request batching.
//!
//! `RequestBatcher` gathers items (e.g. favorite ids toggled in quick
//! succession) and hands them to a callback as one batch, either after a
//! quiet period or as soon as the batch is full.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::MobileProfile;

type BatchHandler<T> = Box<dyn Fn(Vec<T>) + Send + Sync>;

struct BatchState<T> {
    items: Vec<T>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Inner<T> {
    on_batch: BatchHandler<T>,
    delay: Duration,
    max_batch_size: usize,
    state: Mutex<BatchState<T>>,
}

impl<T: Send + 'static> Inner<T> {
    fn state(&self) -> MutexGuard<'_, BatchState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_batch(&self) -> Vec<T> {
        let mut state = self.state();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        std::mem::take(&mut state.items)
    }

    fn deliver(&self, items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        debug!(size = items.len(), "flushing request batch");
        (self.on_batch)(items);
    }

    async fn flush_after(self: Arc<Self>, generation: u64) {
        tokio::time::sleep(self.delay).await;

        let items = {
            let mut state = self.state();
            if state.generation != generation {
                return;
            }
            state.timer = None;
            state.generation += 1;
            std::mem::take(&mut state.items)
        };
        self.deliver(items);
    }
}

/// Collects items and delivers them in batches.
///
/// Each `add` restarts the quiet-period timer. Reaching `max_batch_size`
/// flushes immediately. Dropping the batcher flushes whatever is pending.
pub struct RequestBatcher<T: Send + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> RequestBatcher<T> {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);
    pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

    pub fn new<F>(on_batch: F, delay: Duration, max_batch_size: usize) -> Self
    where
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                on_batch: Box::new(on_batch),
                delay,
                max_batch_size: max_batch_size.max(1),
                state: Mutex::new(BatchState {
                    items: Vec::new(),
                    generation: 0,
                    timer: None,
                }),
            }),
        }
    }

    /// 500 ms quiet period, batches of at most 50.
    pub fn with_defaults<F>(on_batch: F) -> Self
    where
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        Self::new(on_batch, Self::DEFAULT_DELAY, Self::DEFAULT_MAX_BATCH_SIZE)
    }

    /// Longer delay and larger batches for mobile hosts.
    pub fn mobile<F>(on_batch: F) -> Self
    where
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        Self::new(
            on_batch,
            MobileProfile::BATCH_REQUEST_DELAY,
            MobileProfile::MAX_BATCH_SIZE,
        )
    }

    /// Add an item to the current batch.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn add(&self, item: T) {
        let full = {
            let mut state = self.inner.state();
            state.items.push(item);
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.generation += 1;

            if state.items.len() >= self.inner.max_batch_size {
                Some(std::mem::take(&mut state.items))
            } else {
                let generation = state.generation;
                let inner = Arc::clone(&self.inner);
                state.timer = Some(tokio::spawn(inner.flush_after(generation)));
                None
            }
        };

        if let Some(items) = full {
            self.inner.deliver(items);
        }
    }

    /// Deliver the pending items now, if any.
    pub fn flush(&self) {
        let items = self.inner.take_batch();
        self.inner.deliver(items);
    }

    pub fn pending(&self) -> usize {
        self.inner.state().items.len()
    }
}

impl<T: Send + 'static> Drop for RequestBatcher<T> {
    fn drop(&mut self) {
        self.flush();
    }
}
