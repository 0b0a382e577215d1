//! The relay facade.

use crate::config::RelayConfig;
use crate::fingerprint::FingerprintSource;
use crate::registry::SubscriberRegistry;
use crate::session::{now_ms, StreamSession};
use linkhive_sync_protocol::{ChangeKind, EventEnvelope};
use std::sync::Arc;
use tracing::debug;

/// The server-side event relay.
///
/// One relay instance serves the whole process. Request handlers call
/// the `publish_*` methods after committing a write so other devices of
/// the same user learn about it immediately; the stream endpoint opens
/// one [`StreamSession`] per connection.
pub struct EventRelay {
    registry: Arc<SubscriberRegistry>,
    source: Arc<dyn FingerprintSource>,
    config: RelayConfig,
}

impl EventRelay {
    /// Creates a relay over the given fingerprint source.
    pub fn new(source: Arc<dyn FingerprintSource>, config: RelayConfig) -> Self {
        Self {
            registry: Arc::new(SubscriberRegistry::new()),
            source,
            config,
        }
    }

    /// Announces a bookmark change to every live listener of the user.
    /// Returns the number of listeners reached.
    pub fn publish_bookmark(&self, kind: ChangeKind, user_id: &str, target_id: &str) -> usize {
        let envelope = EventEnvelope::bookmark(kind, user_id, target_id, now_ms());
        let delivered = self.registry.publish(envelope);
        debug!(user_id, target_id, delivered, "bookmark change published");
        delivered
    }

    /// Announces a group change to every live listener of the user.
    pub fn publish_group(&self, kind: ChangeKind, user_id: &str, target_id: &str) -> usize {
        let envelope = EventEnvelope::group(kind, user_id, target_id, now_ms());
        let delivered = self.registry.publish(envelope);
        debug!(user_id, target_id, delivered, "group change published");
        delivered
    }

    /// Opens a stream session for one connection. `last_event_id` is
    /// the client's resume cursor from a previous connection, if any.
    pub fn open_stream(&self, user_id: &str, last_event_id: Option<u64>) -> StreamSession {
        StreamSession::open(
            self.registry.clone(),
            self.source.clone(),
            &self.config,
            user_id,
            last_event_id,
        )
    }

    /// Returns the number of live listeners for a user.
    pub fn listener_count(&self, user_id: &str) -> usize {
        self.registry.listener_count(user_id)
    }
}
