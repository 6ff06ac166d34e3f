use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;

use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::error::ApiError;

type Flight<V> = Shared<BoxFuture<'static, Result<V, ApiError>>>;

/// Deduplicates concurrent async work per key: the first caller starts the
/// future, later callers with the same key await the same outcome.
pub struct SingleFlight<K, V>
where
    V: Clone + Send + Sync + 'static,
{
    inflight: Mutex<HashMap<K, Flight<V>>>,
}

impl<K, V> Default for SingleFlight<K, V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, Fut>(&self, key: K, start: F) -> Result<V, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let flight = {
            let mut inflight = self.lock();
            match inflight.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let flight = start().boxed().shared();
                    inflight.insert(key.clone(), flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        // Whoever observes completion first retires the flight so the next
        // call starts fresh work.
        let mut inflight = self.lock();
        if inflight
            .get(&key)
            .is_some_and(|current| current.ptr_eq(&flight))
        {
            inflight.remove(&key);
        }
        result
    }

    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, Flight<V>>> {
        self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
