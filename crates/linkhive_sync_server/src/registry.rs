//! The per-user subscriber registry.

use linkhive_sync_protocol::EventEnvelope;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::trace;

/// Opaque handle identifying one subscription.
pub type SubscriberId = u64;

/// A registry of live listeners keyed by user.
///
/// A user with zero listeners has no entry: the map entry is removed on
/// the last unsubscribe, so the registry never grows with departed
/// connections. Publishing to a user with no listeners is a no-op; the
/// registry does not persist events.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<String, HashMap<SubscriberId, mpsc::UnboundedSender<EventEnvelope>>>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `user_id` and returns its handle plus
    /// the event receiver.
    pub fn subscribe(
        &self,
        user_id: &str,
    ) -> (SubscriberId, mpsc::UnboundedReceiver<EventEnvelope>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .entry(user_id.to_string())
            .or_default()
            .insert(id, tx);
        trace!(user_id, id, "subscriber registered");
        (id, rx)
    }

    /// Removes a listener. Idempotent: removing an absent id, or a user
    /// with no entry, is a no-op.
    pub fn unsubscribe(&self, user_id: &str, id: SubscriberId) {
        let mut subscribers = self.subscribers.lock();
        if let Some(listeners) = subscribers.get_mut(user_id) {
            listeners.remove(&id);
            if listeners.is_empty() {
                subscribers.remove(user_id);
            }
        }
    }

    /// Delivers an event to every live listener of its user. Returns
    /// the number of listeners reached; zero listeners is a no-op.
    /// Listeners whose receiver is gone are pruned.
    pub fn publish(&self, envelope: EventEnvelope) -> usize {
        let mut subscribers = self.subscribers.lock();
        let Some(listeners) = subscribers.get_mut(&envelope.user_id) else {
            return 0;
        };

        let mut delivered = 0;
        listeners.retain(|_, tx| match tx.send(envelope.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => false,
        });
        if listeners.is_empty() {
            subscribers.remove(&envelope.user_id);
        }
        delivered
    }

    /// Returns the number of live listeners for a user.
    pub fn listener_count(&self, user_id: &str) -> usize {
        self.subscribers
            .lock()
            .get(user_id)
            .map(|listeners| listeners.len())
            .unwrap_or(0)
    }

    /// Returns the number of users with at least one listener.
    pub fn user_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
