//! Per-connection stream sessions.

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::fingerprint::{Fingerprint, FingerprintSource};
use crate::registry::{SubscriberId, SubscriberRegistry};
use linkhive_sync_protocol::{encode_comment, encode_event, ChangeKind, EventEnvelope};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// One live push connection for one user.
///
/// A session merges three sources into a single outbound SSE frame
/// stream: events published through the registry, synthetic "updated"
/// events from the fingerprint poll, and keepalive comments. Event ids
/// are a monotonic per-connection counter starting above the client's
/// resume cursor.
///
/// All per-connection resources (the registry entry and both timers)
/// are torn down by [`StreamSession::close`], which is idempotent and
/// also runs on drop, so a peer abort can never leak a listener.
pub struct StreamSession {
    user_id: String,
    subscriber_id: SubscriberId,
    registry: Arc<SubscriberRegistry>,
    frames: mpsc::UnboundedReceiver<String>,
    tasks: Vec<JoinHandle<()>>,
    closed: bool,
}

impl StreamSession {
    /// Opens a session: registers the listener and starts the forward,
    /// poll, and keepalive tasks.
    pub fn open(
        registry: Arc<SubscriberRegistry>,
        source: Arc<dyn FingerprintSource>,
        config: &RelayConfig,
        user_id: &str,
        last_event_id: Option<u64>,
    ) -> Self {
        let (subscriber_id, mut events) = registry.subscribe(user_id);
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        // Resume is best-effort: ids continue above the client's cursor
        // so a reconnect never hands out an id it has already seen.
        let next_id = Arc::new(AtomicU64::new(last_event_id.unwrap_or(0) + 1));

        let mut tasks = Vec::new();

        // Registry events -> frames.
        {
            let frames_tx = frames_tx.clone();
            let next_id = next_id.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(mut envelope) = events.recv().await {
                    envelope.id = next_id.fetch_add(1, Ordering::SeqCst);
                    let frame = encode_event(envelope.id, &envelope.to_json());
                    if frames_tx.send(frame).is_err() {
                        break;
                    }
                }
            }));
        }

        // Fingerprint poll -> synthetic coarse invalidation events.
        {
            let frames_tx = frames_tx.clone();
            let next_id = next_id.clone();
            let source = source.clone();
            let user = user_id.to_string();
            let interval = config.poll_interval;
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                let mut last: Option<Fingerprint> = None;
                loop {
                    ticker.tick().await;
                    match source.fingerprint(&user).await {
                        Ok(current) => {
                            let changed = last.as_ref().is_some_and(|prev| *prev != current);
                            last = Some(current);
                            if changed {
                                debug!(user, "fingerprint changed; emitting synthetic event");
                                let mut envelope = EventEnvelope::bookmark(
                                    ChangeKind::Updated,
                                    user.clone(),
                                    "*",
                                    now_ms(),
                                );
                                envelope.id = next_id.fetch_add(1, Ordering::SeqCst);
                                let frame = encode_event(envelope.id, &envelope.to_json());
                                if frames_tx.send(frame).is_err() {
                                    break;
                                }
                            }
                        }
                        // Poll errors are swallowed and retried next
                        // tick; they never terminate the stream.
                        Err(err) => trace!(user, %err, "fingerprint poll failed"),
                    }
                }
            }));
        }

        // Keepalive comments on a longer fixed interval.
        {
            let interval = config.keepalive_interval;
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                // The first tick completes immediately; consume it so
                // the first keepalive arrives one full interval after
                // connect rather than at t=0.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if frames_tx.send(encode_comment("keepalive")).is_err() {
                        break;
                    }
                }
            }));
        }

        Self {
            user_id: user_id.to_string(),
            subscriber_id,
            registry,
            frames: frames_rx,
            tasks,
            closed: false,
        }
    }

    /// Receives the next encoded SSE frame.
    pub async fn next_frame(&mut self) -> RelayResult<String> {
        self.frames.recv().await.ok_or(RelayError::SessionClosed)
    }

    /// Tears down the listener registration and both timers. Safe to
    /// call repeatedly; a double close does nothing the second time.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.registry.unsubscribe(&self.user_id, self.subscriber_id);
        debug!(user = %self.user_id, "stream session closed");
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Current wall-clock time, unix milliseconds.
pub(crate) fn now_ms() -> i64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
