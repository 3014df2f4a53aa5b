//! Trailing-edge debounce and leading-edge throttle.
//!
//! [`DebouncedAction`] collapses a burst of `execute` calls into one run of
//! the wrapped async action, using the arguments of the last call.
//! [`Throttle`] does the opposite: the first call in a window runs and the
//! rest are rejected.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::DebounceConfig;

type BoxedAction<A, T, E> = Box<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type Handler<V> = Box<dyn Fn(V) + Send + Sync>;

#[derive(Default)]
struct State {
    /// Bumped on every `execute` and `cancel`; a timer only fires if its
    /// generation is still current.
    generation: u64,
    timer: Option<JoinHandle<()>>,
    in_flight: usize,
}

struct Inner<A, T, E> {
    action: BoxedAction<A, T, E>,
    delay: Duration,
    on_success: Option<Handler<T>>,
    on_error: Option<Handler<E>>,
    state: Mutex<State>,
    loading: watch::Sender<bool>,
}

impl<A, T, E> Inner<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fire(self: Arc<Self>, generation: u64, args: A) {
        tokio::time::sleep(self.delay).await;

        {
            let mut state = self.state();
            if state.generation != generation {
                return;
            }
            // Past this point the run can no longer be superseded.
            state.timer = None;
            state.in_flight += 1;
        }
        let _in_flight = InFlight(&*self);

        match (self.action)(args).await {
            Ok(result) => {
                if let Some(on_success) = &self.on_success {
                    on_success(result);
                }
            }
            Err(err) => match &self.on_error {
                Some(on_error) => on_error(err),
                None => warn!("debounced action failed with no error handler"),
            },
        }
    }
}

impl<A, T, E> Inner<A, T, E> {
    /// Clear the loading flag once nothing is scheduled or running.
    fn settle(&self, state: &State) {
        if state.timer.is_none() && state.in_flight == 0 {
            self.loading.send_replace(false);
        }
    }
}

/// Ends one run, including when the action or a handler panics.
struct InFlight<'a, A, T, E>(&'a Inner<A, T, E>);

impl<A, T, E> Drop for InFlight<'_, A, T, E> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight -= 1;
        self.0.settle(&state);
    }
}

/// An async action whose rapid repeated invocations collapse into one
/// trailing run.
///
/// Results are delivered to the `on_success` / `on_error` handlers; `execute`
/// itself returns immediately. Dropping the `DebouncedAction` cancels a
/// scheduled run, so handlers never fire for a torn-down owner. A run that
/// already started is left to finish.
///
/// ```
/// use offline_resilience::{DebounceConfig, DebouncedAction};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let toggled = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&toggled);
///
/// let toggle = DebouncedAction::builder(|favorite: bool| async move { Ok::<_, String>(favorite) })
///     .config(DebounceConfig::new().delay(Duration::from_millis(10)).build())
///     .on_success(move |favorite| sink.lock().unwrap().push(favorite))
///     .build();
///
/// toggle.execute(true);
/// toggle.execute(false);
/// toggle.execute(true);
///
/// tokio::time::sleep(Duration::from_millis(50)).await;
/// assert_eq!(*toggled.lock().unwrap(), vec![true]);
/// # }
/// ```
pub struct DebouncedAction<A, T, E> {
    inner: Arc<Inner<A, T, E>>,
}

impl<A, T, E> DebouncedAction<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn builder<F, Fut>(action: F) -> DebouncedActionBuilder<A, T, E>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        DebouncedActionBuilder {
            action: Box::new(move |args| action(args).boxed()),
            config: DebounceConfig::default(),
            on_success: None,
            on_error: None,
        }
    }

    /// Wrap `action` with the given delay and no handlers.
    pub fn new<F, Fut>(action: F, config: DebounceConfig) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::builder(action).config(config).build()
    }

    /// Schedule the action with `args`, replacing any run that has not
    /// fired yet.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn execute(&self, args: A) {
        let mut state = self.inner.state();
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        self.inner.loading.send_replace(true);

        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        state.timer = Some(tokio::spawn(inner.fire(generation, args)));
    }

    /// Cancel a scheduled run. Returns `true` if one was pending.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.state();
        state.generation += 1;
        let cancelled = match state.timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        };
        self.inner.settle(&state);
        if cancelled {
            debug!("cancelled pending debounced action");
        }
        cancelled
    }

    /// True from an `execute` until the run it scheduled has finished.
    pub fn is_loading(&self) -> bool {
        *self.inner.loading.borrow()
    }

    /// Watch the loading flag, e.g. to drive a spinner.
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.inner.loading.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.state().timer.is_some()
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }
}

impl<A, T, E> Drop for DebouncedAction<A, T, E> {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }
}

impl<A, T, E> fmt::Debug for DebouncedAction<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebouncedAction")
            .field("delay", &self.inner.delay)
            .field("loading", &*self.inner.loading.borrow())
            .finish()
    }
}

/// Builder for [`DebouncedAction`].
pub struct DebouncedActionBuilder<A, T, E> {
    action: BoxedAction<A, T, E>,
    config: DebounceConfig,
    on_success: Option<Handler<T>>,
    on_error: Option<Handler<E>>,
}

impl<A, T, E> DebouncedActionBuilder<A, T, E> {
    pub fn config(mut self, config: DebounceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    pub fn on_success<F>(mut self, handler: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on_success = Some(Box::new(handler));
        self
    }

    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(E) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> DebouncedAction<A, T, E> {
        let (loading, _) = watch::channel(false);
        DebouncedAction {
            inner: Arc::new(Inner {
                action: self.action,
                delay: self.config.delay,
                on_success: self.on_success,
                on_error: self.on_error,
                state: Mutex::new(State::default()),
                loading,
            }),
        }
    }
}

/// Leading-edge throttle: at most one call per `limit` window.
#[derive(Debug)]
pub struct Throttle {
    limit: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            last: Mutex::new(None),
        }
    }

    /// Claim the current window. Returns `false` if it is already taken.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(at) if now.duration_since(at) < self.limit => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Run `f` if the window is open.
    pub fn call<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if self.try_acquire() {
            Some(f())
        } else {
            None
        }
    }
}
