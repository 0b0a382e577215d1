//! The mutation pipeline.
//!
//! Writes confirm remotely first. Creates patch the cache from the
//! server-confirmed row and reconcile in the background; updates and
//! deletes invalidate-and-refetch, because they can change denormalized
//! fields the client must not recompute. Every local mutation opens the
//! echo-suppression window.

use crate::error::SyncResult;
use crate::orchestrator::SyncOrchestrator;
use crate::transport::SyncTransport;
use linkhive_sync_protocol::{Group, Item, ItemDraft};
use std::sync::Arc;
use tracing::warn;

/// Performs create/update/delete operations against the remote store
/// and keeps the local cache coherent.
pub struct MutationPipeline {
    orchestrator: Arc<SyncOrchestrator>,
    transport: Arc<dyn SyncTransport>,
}

impl MutationPipeline {
    /// Creates a pipeline sharing the orchestrator's transport.
    pub fn new(orchestrator: Arc<SyncOrchestrator>, transport: Arc<dyn SyncTransport>) -> Self {
        Self {
            orchestrator,
            transport,
        }
    }

    /// Creates an item.
    ///
    /// The confirmed row is upserted into the cache immediately
    /// (identity is server-assigned, so there is no before-confirm
    /// guess), then a background reconciliation picks up server-side
    /// effects such as auto-grouping that the immediate response may
    /// not carry.
    pub async fn create_item(&self, draft: ItemDraft) -> SyncResult<Item> {
        let saved = self.transport.create_item(draft).await?;
        self.orchestrator.upsert_item(saved.clone())?;
        self.orchestrator.suppress();
        self.spawn_refresh();
        Ok(saved)
    }

    /// Updates an item wholesale, then refetches ground truth.
    pub async fn update_item(&self, item: Item) -> SyncResult<()> {
        self.transport.update_item(item).await?;
        self.invalidate_and_refetch().await
    }

    /// Moves an item to a different group, then refetches ground truth.
    pub async fn update_item_group(&self, key: &str, group_name: &str) -> SyncResult<()> {
        self.transport.update_item_group(key, group_name).await?;
        self.invalidate_and_refetch().await
    }

    /// Deletes an item, then refetches ground truth.
    pub async fn delete_item(&self, key: &str) -> SyncResult<()> {
        self.transport.delete_item(key).await?;
        self.invalidate_and_refetch().await
    }

    /// Creates a group, then refetches ground truth.
    pub async fn create_group(&self, group: Group) -> SyncResult<Group> {
        let saved = self.transport.create_group(group).await?;
        self.invalidate_and_refetch().await?;
        Ok(saved)
    }

    /// Updates a group, then refetches ground truth.
    pub async fn update_group(&self, group: Group) -> SyncResult<()> {
        self.transport.update_group(group).await?;
        self.invalidate_and_refetch().await
    }

    /// Deletes a group, then refetches ground truth.
    pub async fn delete_group(&self, id: &str) -> SyncResult<()> {
        self.transport.delete_group(id).await?;
        self.invalidate_and_refetch().await
    }

    /// Reorders groups, then refetches ground truth.
    pub async fn reorder_groups(&self, ids: Vec<String>) -> SyncResult<()> {
        self.transport.reorder_groups(ids).await?;
        self.invalidate_and_refetch().await
    }

    /// Suppresses realtime echoes, then replaces both collections from
    /// the server. No optimistic local transform happens on this path.
    async fn invalidate_and_refetch(&self) -> SyncResult<()> {
        self.orchestrator.suppress();
        self.orchestrator.refresh().await?;
        Ok(())
    }

    fn spawn_refresh(&self) {
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            if let Err(err) = orchestrator.refresh().await {
                warn!(%err, "background reconciliation failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::error::SyncError;
    use crate::store::MemoryStateStore;
    use crate::transport::MockTransport;
    use linkhive_sync_protocol::PullResponse;
    use std::time::Duration;

    fn make_item(id: &str) -> Item {
        Item {
            id: id.into(),
            url: format!("https://example.com/{id}"),
            title: id.into(),
            description: None,
            icon_url: None,
            preview_url: None,
            created_at: 1,
            group_name: "Reading".into(),
            group_color: None,
        }
    }

    fn make_draft(url: &str) -> ItemDraft {
        ItemDraft {
            url: url.into(),
            title: "t".into(),
            description: None,
            icon_url: None,
            group_name: "Reading".into(),
        }
    }

    fn pipeline_with(
        transport: Arc<MockTransport>,
        config: SyncConfig,
    ) -> (MutationPipeline, Arc<SyncOrchestrator>) {
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::new(MemoryStateStore::new()),
            transport.clone(),
            config,
        ));
        (
            MutationPipeline::new(orchestrator.clone(), transport),
            orchestrator,
        )
    }

    #[tokio::test]
    async fn create_upserts_confirmed_row_then_reconciles() {
        let transport = Arc::new(MockTransport::new());
        transport.push_pull_response(PullResponse::complete(vec![make_item("srv-1")], vec![]));
        let (pipeline, orch) = pipeline_with(transport.clone(), SyncConfig::default());

        let saved = pipeline.create_item(make_draft("https://example.com/x")).await.unwrap();
        assert!(!saved.id.is_empty());

        // The confirmed row is in the cache before the background
        // reconciliation lands.
        let cached = orch.cache().read_items().unwrap().unwrap().data;
        assert_eq!(cached[0].id, saved.id);

        // The background refresh eventually runs exactly once.
        tokio::time::timeout(Duration::from_secs(2), async {
            while transport.pull_count() < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(transport.pull_count(), 1);
    }

    #[tokio::test]
    async fn create_suppresses_realtime_echo() {
        let transport = Arc::new(MockTransport::new());
        transport.push_pull_response(PullResponse::complete(vec![], vec![]));
        let config = SyncConfig::default().with_suppression_window(Duration::from_secs(5));
        let (pipeline, orch) = pipeline_with(transport.clone(), config);

        pipeline.create_item(make_draft("https://example.com/x")).await.unwrap();

        // A realtime echo arriving now is dropped.
        assert!(!orch.on_remote_change().await.unwrap());
    }

    #[tokio::test]
    async fn delete_refetches_instead_of_patching_locally() {
        let transport = Arc::new(MockTransport::new());
        // Server ground truth after the delete: only "b" remains.
        transport.push_pull_response(PullResponse::complete(vec![make_item("b")], vec![]));
        let (pipeline, orch) = pipeline_with(transport.clone(), SyncConfig::default());
        orch.cache().write_items(&[make_item("a"), make_item("b")]).unwrap();

        pipeline.delete_item("a").await.unwrap();

        assert_eq!(transport.mutation_log(), vec!["delete_item a"]);
        assert_eq!(transport.pull_count(), 1);
        let cached = orch.cache().read_items().unwrap().unwrap().data;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "b");
    }

    #[tokio::test]
    async fn failed_mutation_leaves_cache_untouched() {
        let transport = Arc::new(MockTransport::new());
        let (pipeline, orch) = pipeline_with(transport.clone(), SyncConfig::default());
        orch.cache().write_items(&[make_item("a")]).unwrap();
        transport.fail_with(SyncError::transport_retryable("reset"));

        let result = pipeline.delete_item("a").await;
        assert!(result.is_err());

        // No refetch happened and the cache still holds "a".
        assert_eq!(transport.pull_count(), 0);
        let cached = orch.cache().read_items().unwrap().unwrap().data;
        assert_eq!(cached[0].id, "a");
    }

    #[tokio::test]
    async fn group_mutations_invalidate_and_refetch() {
        let transport = Arc::new(MockTransport::new());
        transport.push_pull_response(PullResponse::complete(vec![], vec![]));
        let (pipeline, _orch) = pipeline_with(transport.clone(), SyncConfig::default());

        pipeline
            .reorder_groups(vec!["g2".into(), "g1".into()])
            .await
            .unwrap();

        assert_eq!(transport.mutation_log(), vec!["reorder_groups g2,g1"]);
        assert_eq!(transport.pull_count(), 1);
    }
}
