//! The typed UI ↔ engine request/response bridge.
//!
//! The UI process speaks to the engine through a closed set of message
//! kinds. Matching is exhaustive, so adding a request kind will not
//! compile until every handler covers it. An unauthorized failure is
//! reported distinctly and also ends the session locally.

use crate::error::SyncResult;
use crate::mutation::MutationPipeline;
use crate::orchestrator::SyncOrchestrator;
use crate::realtime::RealtimeClient;
use linkhive_sync_protocol::{EngineRequest, EngineResponse};
use std::sync::Arc;
use tracing::warn;

/// Dispatches engine requests to the orchestrator, mutation pipeline,
/// and realtime client.
pub struct EngineBridge {
    orchestrator: Arc<SyncOrchestrator>,
    mutations: MutationPipeline,
    realtime: Arc<RealtimeClient>,
}

impl EngineBridge {
    /// Wires the bridge over an already-constructed engine.
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        mutations: MutationPipeline,
        realtime: Arc<RealtimeClient>,
    ) -> Self {
        Self {
            orchestrator,
            mutations,
            realtime,
        }
    }

    /// Handles one request and produces its typed response.
    pub async fn handle(&self, request: EngineRequest) -> EngineResponse {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) if err.is_unauthorized() => {
                self.end_session();
                EngineResponse::unauthorized()
            }
            Err(err) => EngineResponse::failed(err.to_string()),
        }
    }

    async fn dispatch(&self, request: EngineRequest) -> SyncResult<EngineResponse> {
        match request {
            EngineRequest::FetchAll => {
                // First-ever load hydrates progressively; afterwards the
                // freshness-gated read path decides whether to go out.
                let never_loaded = self.orchestrator.cache().read_items()?.is_none();
                if never_loaded {
                    let snapshot = self.orchestrator.hydrate().await?;
                    return Ok(EngineResponse::Collections {
                        items: snapshot.items,
                        groups: snapshot.groups,
                    });
                }
                let items = self.orchestrator.items().await?;
                let groups = self.orchestrator.groups().await?;
                Ok(EngineResponse::Collections { items, groups })
            }
            EngineRequest::Save(draft) => {
                let saved = self.mutations.create_item(draft).await?;
                Ok(EngineResponse::Saved(saved))
            }
            EngineRequest::Update(item) => {
                self.mutations.update_item(item).await?;
                Ok(EngineResponse::Done)
            }
            EngineRequest::UpdateCategory { key, group_name } => {
                self.mutations.update_item_group(&key, &group_name).await?;
                Ok(EngineResponse::Done)
            }
            EngineRequest::Delete { key } => {
                self.mutations.delete_item(&key).await?;
                Ok(EngineResponse::Done)
            }
            EngineRequest::Refresh => {
                let snapshot = self.orchestrator.refresh().await?;
                Ok(EngineResponse::Collections {
                    items: snapshot.items,
                    groups: snapshot.groups,
                })
            }
            EngineRequest::ForceLogout => {
                self.end_session();
                Ok(EngineResponse::Done)
            }
        }
    }

    /// Stops the realtime client and clears every persisted slot.
    fn end_session(&self) {
        self.realtime.stop();
        if let Err(err) = self.orchestrator.sign_out() {
            warn!(%err, "clearing local state on logout failed");
        }
    }
}
