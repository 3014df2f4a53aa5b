//! Online/offline state tracking.
//!
//! `NetworkMonitor` is the single source of truth for connectivity. Hosts
//! feed it signals (browser events, a health check, or manual calls) and it
//! notifies subscribers only when the state actually changes.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::info;

use crate::subscription::{Listeners, Subscription};

/// Connectivity signal delivered by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkSignal {
    Online,
    Offline,
}

impl NetworkSignal {
    pub fn is_online(self) -> bool {
        matches!(self, NetworkSignal::Online)
    }
}

/// Transitions not yet delivered to listeners.
#[derive(Default)]
struct Outbox {
    pending: VecDeque<bool>,
    draining: bool,
}

struct Inner {
    online: AtomicBool,
    outbox: Mutex<Outbox>,
    listeners: Arc<Listeners<bool>>,
    watch: watch::Sender<bool>,
}

/// Tracks whether the host is online and notifies on transitions.
///
/// Cloning shares the same state.
///
/// ```
/// use offline_resilience::{NetworkMonitor, NetworkSignal};
/// use std::sync::{Arc, Mutex};
///
/// let monitor = NetworkMonitor::new(true);
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let _sub = monitor.on_connection_change(move |online| sink.lock().unwrap().push(online));
///
/// monitor.handle_signal(NetworkSignal::Offline);
/// monitor.handle_signal(NetworkSignal::Offline);
/// assert_eq!(*seen.lock().unwrap(), vec![false]);
/// ```
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<Inner>,
}

impl NetworkMonitor {
    /// Create a monitor seeded with the host's current state.
    pub fn new(initially_online: bool) -> Self {
        let (watch, _) = watch::channel(initially_online);
        Self {
            inner: Arc::new(Inner {
                online: AtomicBool::new(initially_online),
                outbox: Mutex::new(Outbox::default()),
                listeners: Listeners::new(),
                watch,
            }),
        }
    }

    pub fn get_is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Apply a host signal.
    pub fn handle_signal(&self, signal: NetworkSignal) {
        self.set_online(signal.is_online());
    }

    /// Record the current state. Returns `true` if this was a transition;
    /// repeating the current state is ignored.
    ///
    /// Listeners run without any lock held, so a listener may call
    /// `set_online` itself. Such a nested transition is delivered after the
    /// current one has reached every listener.
    pub fn set_online(&self, online: bool) -> bool {
        let mut outbox = self.outbox();
        if self.inner.online.swap(online, Ordering::SeqCst) == online {
            return false;
        }

        info!(online, "network state changed");
        self.inner.watch.send_replace(online);
        outbox.pending.push_back(online);

        // Whoever is already draining will deliver this one, in order.
        if outbox.draining {
            return true;
        }
        outbox.draining = true;

        while let Some(next) = outbox.pending.pop_front() {
            drop(outbox);
            self.inner.listeners.notify(&next);
            outbox = self.outbox();
        }
        outbox.draining = false;
        true
    }

    /// Register a callback invoked with the new state on every transition.
    ///
    /// The callback stays registered until the returned handle is dropped.
    pub fn on_connection_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.listeners.add(move |online: &bool| callback(*online))
    }

    /// A watch receiver over the online flag, for async consumers.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.watch.subscribe()
    }

    /// Resolve once the monitor reports online. Returns immediately if it already does.
    pub async fn wait_until_online(&self) {
        let mut rx = self.watch();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|online| *online).await;
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.inner.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NetworkMonitor {
    /// Assume online, matching a host that reports no connectivity events.
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("online", &self.get_is_online())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
