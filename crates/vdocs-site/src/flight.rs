//! Per-key single-flight execution.
//!
//! Concurrent callers asking for the same key share one execution. The
//! shared work runs as a spawned task, so it completes (and can populate
//! caches) even if every caller is dropped mid-wait.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

/// The shared task ended without producing a value (it panicked or was aborted).
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("shared load task ended without a result")]
pub struct FlightAborted;

struct Flight<V> {
    id: u64,
    rx: watch::Receiver<Option<V>>,
}

type Inflight<K, V> = Arc<Mutex<HashMap<K, Flight<V>>>>;

/// Coalesces concurrent executions per key.
pub(crate) struct SingleFlight<K, V> {
    inflight: Inflight<K, V>,
    next_id: AtomicU64,
}

/// Removes a flight from the map when its task finishes or unwinds.
struct FlightGuard<K: Eq + Hash, V> {
    inflight: Inflight<K, V>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, V> Drop for FlightGuard<K, V> {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        if inflight.get(&self.key).is_some_and(|f| f.id == self.id) {
            inflight.remove(&self.key);
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `make()` for `key`, or join the execution already in flight.
    ///
    /// `make` is only called when no execution for `key` is running.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> Result<V, FlightAborted>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (mut rx, start) = {
            let mut inflight = self.inflight.lock();
            if let Some(flight) = inflight.get(&key) {
                (flight.rx.clone(), None)
            } else {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                inflight.insert(
                    key.clone(),
                    Flight {
                        id,
                        rx: rx.clone(),
                    },
                );
                let guard = FlightGuard {
                    inflight: Arc::clone(&self.inflight),
                    key,
                    id,
                };
                (rx, Some((tx, guard)))
            }
        };

        if let Some((tx, guard)) = start {
            let fut = make();
            tokio::spawn(async move {
                let value = fut.await;
                // Receivers may all be gone; the value is still published to the cache by `fut`.
                let _ = tx.send(Some(value));
                drop(guard);
            });
        }

        let value = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| FlightAborted)?;
        value.clone().ok_or(FlightAborted)
    }

    /// Detach in-flight executions matching `pred`.
    ///
    /// Their tasks keep running and current waiters still get the result,
    /// but later callers start a fresh execution.
    pub fn forget_where(&self, mut pred: impl FnMut(&K) -> bool) {
        self.inflight.lock().retain(|key, _| !pred(key));
    }

    /// Number of executions in flight.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inflight.lock().len()
    }
}
