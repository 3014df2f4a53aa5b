//! Listener registry shared by the network monitor and the offline queue.
//!
//! Registering a callback returns a [`Subscription`]. Dropping the handle
//! unregisters the callback, so a subscription lives exactly as long as the
//! scope that owns it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub(crate) struct Listeners<T> {
    next_id: AtomicU64,
    slots: Mutex<Vec<(u64, Callback<T>)>>,
}

impl<T: 'static> Listeners<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(0),
            slots: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn add<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.slots().push((id, Arc::new(callback)));

        let registry: Weak<Self> = Arc::downgrade(self);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.slots().retain(|(slot, _)| *slot != id);
                }
            })),
        }
    }

    /// Invoke every callback with `value`, in registration order.
    ///
    /// Callbacks run without the registry lock held, so they may subscribe
    /// or unsubscribe.
    pub(crate) fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> =
            self.slots().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots().len()
    }

    fn slots(&self) -> MutexGuard<'_, Vec<(u64, Callback<T>)>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle for a registered callback. Unsubscribes when dropped.
#[must_use = "dropping a Subscription unsubscribes the callback immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Unregister the callback now.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the callback registered for the lifetime of its source.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
