//! In-flight request deduplication.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

type SharedRequest<T> = Shared<BoxFuture<'static, T>>;

/// Shares one in-flight request between concurrent callers using the same key.
///
/// The first caller's request runs; callers arriving while it is pending
/// await the same result. Once it completes the key is released, so the
/// next call starts a fresh request.
pub struct RequestDeduplicator<T> {
    pending: Arc<Mutex<HashMap<String, SharedRequest<T>>>>,
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn execute<F, Fut>(&self, key: impl Into<String>, request: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let key = key.into();
        let shared = {
            let mut pending = self.pending();
            match pending.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let shared = request().boxed().shared();
                    pending.insert(key.clone(), shared.clone());
                    shared
                }
            }
        };

        let result = shared.clone().await;

        let mut pending = self.pending();
        if pending.get(&key).is_some_and(|current| current.ptr_eq(&shared)) {
            pending.remove(&key);
        }
        result
    }

    /// Number of keys with a request in flight.
    pub fn in_flight(&self) -> usize {
        self.pending().len()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, SharedRequest<T>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RequestDeduplicator<T> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}
