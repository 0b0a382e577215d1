//! Single-flight coalescing of concurrent operations.
//!
//! The UI, the mutation pipeline, and the realtime client can all
//! decide "I should refetch" within the same tick. Without coalescing,
//! those interleavings cause duplicate network calls; with it, for any
//! key at most one underlying operation is outstanding at a time and
//! every concurrent caller receives a clone of its result.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use tokio::sync::broadcast;

/// Coalesces concurrent operations by key.
pub struct SingleFlight<K, T> {
    inflight: Mutex<HashMap<K, broadcast::Sender<SyncResult<T>>>>,
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone + Send + 'static,
{
    /// Creates an empty coalescer.
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `op` under `key`, or joins the operation already in flight
    /// for that key.
    ///
    /// The key is removed when the operation completes, success or
    /// failure, so a later call always starts fresh.
    pub async fn run<F, Fut>(&self, key: K, op: F) -> SyncResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        // Either subscribe to the in-flight operation or register as
        // the leader. Decided under the lock so two callers can never
        // both lead.
        let joined = {
            let mut inflight = self.inflight.lock();
            match inflight.get(&key) {
                Some(tx) => Some(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    inflight.insert(key.clone(), tx);
                    None
                }
            }
        };

        if let Some(mut rx) = joined {
            return match rx.recv().await {
                Ok(result) => result,
                // Leader dropped without sending: its task was aborted.
                Err(_) => Err(SyncError::Cancelled),
            };
        }

        // The guard holds the key across the await. If the leader's
        // future is dropped mid-operation (task aborted), the guard
        // removes the key and drops the sender, so waiters observe
        // cancellation and the next caller starts fresh instead of
        // subscribing to a channel that never sends.
        let mut guard = FlightGuard {
            inflight: &self.inflight,
            key: Some(key),
        };

        let result = op().await;

        // Remove before sending: a subscriber always registered while
        // the key was present, so it cannot miss the send; a caller
        // arriving after removal starts a fresh operation.
        if let Some(key) = guard.key.take() {
            let tx = self.inflight.lock().remove(&key);
            if let Some(tx) = tx {
                let _ = tx.send(result.clone());
            }
        }
        result
    }

    /// Returns the number of keys currently in flight.
    pub fn inflight_len(&self) -> usize {
        self.inflight.lock().len()
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the leader's key if its future is dropped before the
/// normal completion path takes the key out.
struct FlightGuard<'a, K: Eq + Hash, T> {
    inflight: &'a Mutex<HashMap<K, broadcast::Sender<SyncResult<T>>>>,
    key: Option<K>,
}

impl<K: Eq + Hash, T> Drop for FlightGuard<'_, K, T> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.inflight.lock().remove(&key);
        }
    }
}
