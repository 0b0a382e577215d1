//! The realtime event client.
//!
//! Maintains one long-lived push connection per session, parses the
//! SSE framing incrementally, and asks the orchestrator to reconcile on
//! every bookmark/group change event. Dropped connections reconnect
//! with capped exponential backoff plus jitter, resuming from the last
//! delivered event id.

use crate::config::RetryConfig;
use crate::error::SyncResult;
use crate::orchestrator::SyncOrchestrator;
use async_trait::async_trait;
use linkhive_sync_protocol::{EventEnvelope, SseFrame, SseParser};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// One live push stream.
#[async_trait]
pub trait EventSource: Send {
    /// Reads the next chunk of bytes. `None` on clean EOF. Chunks may
    /// split frames, lines, or characters anywhere.
    async fn next_chunk(&mut self) -> SyncResult<Option<Vec<u8>>>;
}

/// Opens push streams.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Opens a stream, resuming after `last_event_id` when given.
    async fn connect(&self, last_event_id: Option<u64>) -> SyncResult<Box<dyn EventSource>>;
}

/// The realtime client. `start` and `stop` are both idempotent.
pub struct RealtimeClient {
    transport: Arc<dyn EventTransport>,
    orchestrator: Arc<SyncOrchestrator>,
    retry: RetryConfig,
    last_event_id: Arc<Mutex<Option<u64>>>,
    running: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl RealtimeClient {
    /// Creates a client bound to an orchestrator.
    pub fn new(
        transport: Arc<dyn EventTransport>,
        orchestrator: Arc<SyncOrchestrator>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transport,
            orchestrator,
            retry,
            last_event_id: Arc::new(Mutex::new(None)),
            running: Mutex::new(None),
        }
    }

    /// Starts the connection task. A second call while running is a
    /// no-op.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            self.transport.clone(),
            self.orchestrator.clone(),
            self.retry.clone(),
            self.last_event_id.clone(),
            rx,
        ));
        *running = Some((tx, handle));
    }

    /// Stops the client: aborts the in-flight read, cancels any
    /// scheduled reconnect, and clears resume state so a subsequent
    /// login starts clean. Safe to call repeatedly.
    pub fn stop(&self) {
        if let Some((tx, handle)) = self.running.lock().take() {
            let _ = tx.send(true);
            handle.abort();
        }
        *self.last_event_id.lock() = None;
    }

    /// True while the connection task is registered.
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// The resume cursor, when one has been delivered.
    pub fn last_event_id(&self) -> Option<u64> {
        *self.last_event_id.lock()
    }
}

async fn run_loop(
    transport: Arc<dyn EventTransport>,
    orchestrator: Arc<SyncOrchestrator>,
    retry: RetryConfig,
    last_event_id: Arc<Mutex<Option<u64>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        let resume = *last_event_id.lock();
        let connected = tokio::select! {
            _ = shutdown.changed() => return,
            result = transport.connect(resume) => result,
        };

        match connected {
            Ok(mut source) => {
                // Any fully successful connection resets the backoff.
                attempt = 0;
                debug!(?resume, "realtime stream connected");
                let mut parser = SseParser::new();

                loop {
                    let chunk = tokio::select! {
                        _ = shutdown.changed() => return,
                        chunk = source.next_chunk() => chunk,
                    };
                    match chunk {
                        Ok(Some(bytes)) => {
                            for frame in parser.feed(&bytes) {
                                if handle_frame(&orchestrator, &last_event_id, frame).await {
                                    // Credentials were rejected; the
                                    // session is over.
                                    return;
                                }
                            }
                        }
                        Ok(None) => {
                            debug!("realtime stream ended");
                            break;
                        }
                        Err(err) => {
                            warn!(%err, "realtime stream failed");
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(%err, "realtime connect failed");
            }
        }

        let delay = retry.delay_for_attempt(attempt);
        attempt = attempt.saturating_add(1);
        debug!(?delay, attempt, "scheduling realtime reconnect");
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Handles one parsed frame. Returns true when the session must end
/// (unauthorized during reconciliation).
async fn handle_frame(
    orchestrator: &SyncOrchestrator,
    last_event_id: &Mutex<Option<u64>>,
    frame: SseFrame,
) -> bool {
    match frame {
        SseFrame::Comment(_) => {
            trace!("realtime keepalive");
            false
        }
        SseFrame::Event { id, data } => {
            if let Some(id) = id {
                *last_event_id.lock() = Some(id);
            }
            if data.is_empty() {
                return false;
            }
            match EventEnvelope::parse(&data) {
                Ok(envelope) if envelope.is_change_event() => {
                    match orchestrator.on_remote_change().await {
                        Ok(refetched) => {
                            trace!(refetched, event = %envelope.event_type, "realtime change handled");
                            false
                        }
                        Err(err) if err.is_unauthorized() => {
                            warn!("realtime reconciliation unauthorized; signing out");
                            if let Err(err) = orchestrator.sign_out() {
                                warn!(%err, "sign-out after unauthorized failed");
                            }
                            true
                        }
                        Err(err) => {
                            warn!(%err, "reconciliation after realtime event failed");
                            false
                        }
                    }
                }
                Ok(envelope) => {
                    trace!(event = %envelope.event_type, "ignoring non-change event");
                    false
                }
                Err(err) => {
                    // Malformed payloads are dropped; the stream lives on.
                    debug!(%err, "dropping malformed realtime event");
                    false
                }
            }
        }
    }
}
