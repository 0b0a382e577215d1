//! The sync orchestrator: read path, reconciliation, and merge.

use crate::cache::CacheStore;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::single_flight::SingleFlight;
use crate::store::StateStore;
use crate::transport::SyncTransport;
use linkhive_sync_protocol::{Group, IdentityKeyed, Item, PullRequest};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Logical fetch operations coalesced by the in-flight registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKey {
    /// Fetch driven by a stale items read.
    Items,
    /// Fetch driven by a stale groups read.
    Groups,
    /// Full reconciliation or progressive hydration.
    All,
}

/// Both collections as of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// The items collection.
    pub items: Vec<Item>,
    /// The groups collection.
    pub groups: Vec<Group>,
}

/// Out-of-band notifications published to listeners.
///
/// Background refreshes (mutation- or realtime-triggered) report
/// through this channel rather than a return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncNotice {
    /// The cached items were replaced.
    ItemsUpdated,
    /// The cached groups were replaced.
    GroupsUpdated,
    /// The session ended; all local state was cleared.
    SignedOut,
}

/// Appends `incoming` rows to `base`, skipping rows whose identity key
/// is already present. Append-only and order-preserving of `base`:
/// progressive hydration must not reorder already-rendered rows.
pub fn merge_rows<T: IdentityKeyed + Clone>(base: &[T], incoming: &[T]) -> Vec<T> {
    let mut seen: HashSet<String> = base.iter().map(|row| row.identity_key()).collect();
    let mut merged = base.to_vec();
    for row in incoming {
        if seen.insert(row.identity_key()) {
            merged.push(row.clone());
        }
    }
    merged
}

/// Drives full and progressive synchronization and the freshness-gated
/// read path. Owns the cache and the in-flight registry exclusively.
pub struct SyncOrchestrator {
    cache: CacheStore,
    transport: Arc<dyn SyncTransport>,
    config: SyncConfig,
    flights: SingleFlight<FetchKey, Snapshot>,
    suppress_until: Mutex<Option<Instant>>,
    notices: broadcast::Sender<SyncNotice>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator over injected storage and transport.
    pub fn new(
        store: Arc<dyn StateStore>,
        transport: Arc<dyn SyncTransport>,
        config: SyncConfig,
    ) -> Self {
        let cache = CacheStore::new(store, &config);
        let (notices, _) = broadcast::channel(32);
        Self {
            cache,
            transport,
            config,
            flights: SingleFlight::new(),
            suppress_until: Mutex::new(None),
            notices,
        }
    }

    /// Subscribes to out-of-band sync notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    /// The cache, for callers that need direct slot access (auth token).
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    fn notify(&self, notice: SyncNotice) {
        // No listeners is fine.
        let _ = self.notices.send(notice);
    }

    /// One full fetch: single request bounded by the server cap, both
    /// collections replaced wholesale.
    async fn fetch_full(&self) -> SyncResult<Snapshot> {
        let response = self
            .transport
            .pull(PullRequest::full(self.config.full_fetch_limit))
            .await?;
        self.cache.write_items(&response.items)?;
        self.cache.write_groups(&response.groups)?;
        self.notify(SyncNotice::ItemsUpdated);
        self.notify(SyncNotice::GroupsUpdated);
        Ok(Snapshot {
            items: response.items,
            groups: response.groups,
        })
    }

    /// Returns the items, serving the cache when fresh.
    ///
    /// A stale read blocks on one shared revalidation; there is no
    /// stale-while-revalidate racing here.
    pub async fn items(&self) -> SyncResult<Vec<Item>> {
        if let Some(read) = self.cache.read_items()? {
            if read.is_fresh {
                return Ok(read.data);
            }
        }
        let snapshot = self
            .flights
            .run(FetchKey::Items, || self.fetch_full())
            .await?;
        Ok(snapshot.items)
    }

    /// Returns the groups, serving the cache when fresh.
    pub async fn groups(&self) -> SyncResult<Vec<Group>> {
        if let Some(read) = self.cache.read_groups()? {
            if read.is_fresh {
                return Ok(read.data);
            }
        }
        let snapshot = self
            .flights
            .run(FetchKey::Groups, || self.fetch_full())
            .await?;
        Ok(snapshot.groups)
    }

    /// Full reconciliation, bypassing cache freshness.
    ///
    /// Overlapping refreshes that are not coalesced (distinct keys)
    /// resolve last-write-wins by completion order, not start order.
    pub async fn refresh(&self) -> SyncResult<Snapshot> {
        self.flights.run(FetchKey::All, || self.fetch_full()).await
    }

    /// Progressive initial hydration: a small first page for fast first
    /// paint, then larger cursor-driven pages. Each page is merged into
    /// the cache and published immediately, so listeners see rows
    /// arrive incrementally.
    ///
    /// An error mid-way leaves already-merged pages in the cache.
    pub async fn hydrate(&self) -> SyncResult<Snapshot> {
        self.flights
            .run(FetchKey::All, || self.hydrate_pages())
            .await
    }

    async fn hydrate_pages(&self) -> SyncResult<Snapshot> {
        let mut merged: Vec<Item> = self
            .cache
            .read_items()?
            .map(|read| read.data)
            .unwrap_or_default();
        let mut groups: Vec<Group> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut limit = self.config.initial_page_size;

        loop {
            let response = self
                .transport
                .pull(PullRequest::initial(cursor.clone(), limit))
                .await?;

            merged = merge_rows(&merged, &response.items);
            self.cache.write_items(&merged)?;
            self.notify(SyncNotice::ItemsUpdated);

            if !response.groups.is_empty() || groups.is_empty() {
                groups = response.groups;
                self.cache.write_groups(&groups)?;
                self.notify(SyncNotice::GroupsUpdated);
            }

            if !response.has_more {
                break;
            }
            match response.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    warn!("server reported more pages without a cursor; stopping hydration");
                    break;
                }
            }
            limit = self.config.page_size;
        }

        Ok(Snapshot {
            items: merged,
            groups,
        })
    }

    /// Patches one server-confirmed row into the cached items by
    /// identity key: replace in place when present, else prepend.
    pub fn upsert_item(&self, item: Item) -> SyncResult<()> {
        let mut items = self
            .cache
            .read_items()?
            .map(|read| read.data)
            .unwrap_or_default();

        let key = item.identity_key();
        match items.iter_mut().find(|row| row.identity_key() == key) {
            Some(slot) => *slot = item,
            None => items.insert(0, item),
        }

        self.cache.write_items(&items)?;
        self.notify(SyncNotice::ItemsUpdated);
        Ok(())
    }

    /// Opens a suppression window: realtime-triggered reconciliation
    /// requests arriving before the deadline are dropped.
    pub fn suppress_for(&self, window: Duration) {
        *self.suppress_until.lock() = Some(Instant::now() + window);
    }

    /// Opens a suppression window of the configured length.
    pub fn suppress(&self) {
        self.suppress_for(self.config.suppression_window);
    }

    fn is_suppressed(&self) -> bool {
        let mut deadline = self.suppress_until.lock();
        match *deadline {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                *deadline = None;
                false
            }
            None => false,
        }
    }

    /// Handles a realtime change notification. Returns true when a
    /// reconciliation ran, false when it was suppressed as an echo of a
    /// local mutation.
    pub async fn on_remote_change(&self) -> SyncResult<bool> {
        if self.is_suppressed() {
            debug!("remote change suppressed inside local mutation window");
            return Ok(false);
        }
        self.refresh().await?;
        Ok(true)
    }

    /// Clears every persisted slot and tells listeners the session is
    /// over.
    pub fn sign_out(&self) -> SyncResult<()> {
        self.cache.clear_all()?;
        self.notify(SyncNotice::SignedOut);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::store::MemoryStateStore;
    use crate::transport::MockTransport;
    use async_trait::async_trait;
    use linkhive_sync_protocol::{ItemDraft, PullResponse};

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

    fn make_group(id: &str, order: i32) -> Group {
        Group {
            id: id.into(),
            name: id.into(),
            color: "#fff".into(),
            order,
            count: 0,
        }
    }

    fn orchestrator_with(transport: Arc<MockTransport>, config: SyncConfig) -> SyncOrchestrator {
        SyncOrchestrator::new(Arc::new(MemoryStateStore::new()), transport, config)
    }

    #[test]
    fn merge_is_idempotent_and_order_preserving() {
        let base = vec![make_item("a"), make_item("b")];
        let page = vec![make_item("b"), make_item("c")];

        let once = merge_rows(&base, &page);
        let twice = merge_rows(&once, &page);

        assert_eq!(once, twice);
        let keys: Vec<_> = once.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn fresh_cache_serves_without_network() {
        let transport = Arc::new(MockTransport::new());
        transport.push_pull_response(PullResponse::complete(vec![make_item("a")], vec![]));
        let orch = orchestrator_with(transport.clone(), SyncConfig::default());

        let first = orch.items().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(transport.pull_count(), 1);

        // Second read is served from the fresh cache.
        let second = orch.items().await.unwrap();
        assert_eq!(second, first);
        assert_eq!(transport.pull_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_stale_reads_coalesce_into_one_fetch() {
        let transport = Arc::new(MockTransport::new());
        transport.push_pull_response(PullResponse::complete(vec![make_item("a")], vec![]));
        let orch = Arc::new(orchestrator_with(transport.clone(), SyncConfig::default()));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let orch = orch.clone();
            handles.push(tokio::spawn(async move { orch.items().await }));
        }
        for handle in handles {
            let items = handle.await.unwrap().unwrap();
            assert_eq!(items.len(), 1);
        }
        assert_eq!(transport.pull_count(), 1);
    }

    #[tokio::test]
    async fn hydrate_merges_pages_with_cursor_resume() {
        let transport = Arc::new(MockTransport::new());
        // 5 rows, page size 2, cursor = last identity key.
        transport.push_pull_response(PullResponse::page(
            vec![make_item("a"), make_item("b")],
            vec![make_group("g1", 0)],
            "b",
        ));
        transport.push_pull_response(PullResponse::page(
            vec![make_item("c"), make_item("d")],
            vec![],
            "d",
        ));
        transport.push_pull_response(PullResponse::complete(vec![make_item("e")], vec![]));

        let config = SyncConfig::default().with_page_sizes(2, 2);
        let orch = orchestrator_with(transport.clone(), config);

        let snapshot = orch.hydrate().await.unwrap();
        let keys: Vec<_> = snapshot.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(snapshot.groups.len(), 1);

        let requests = transport.pull_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].cursor, None);
        assert_eq!(requests[0].limit, 2);
        assert_eq!(requests[1].cursor.as_deref(), Some("b"));
        assert_eq!(requests[2].cursor.as_deref(), Some("d"));
    }

    #[tokio::test]
    async fn hydrate_overlapping_pages_deduplicate() {
        let transport = Arc::new(MockTransport::new());
        transport.push_pull_response(PullResponse::page(
            vec![make_item("a"), make_item("b")],
            vec![],
            "b",
        ));
        // Server re-sends "b" at the page boundary.
        transport.push_pull_response(PullResponse::complete(
            vec![make_item("b"), make_item("c")],
            vec![],
        ));

        let orch = orchestrator_with(transport, SyncConfig::default().with_page_sizes(2, 2));
        let snapshot = orch.hydrate().await.unwrap();
        let keys: Vec<_> = snapshot.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn hydrate_partial_failure_keeps_merged_pages() {
        let transport = Arc::new(MockTransport::new());
        transport.push_pull_response(PullResponse::page(
            vec![make_item("a"), make_item("b")],
            vec![],
            "b",
        ));
        transport.fail_after_pulls(1, SyncError::transport_retryable("reset"));
        let orch = orchestrator_with(transport.clone(), SyncConfig::default());

        let result = orch.hydrate().await;
        assert!(result.is_err());

        // The first page stays merged; there is no rollback.
        let cached = orch.cache().read_items().unwrap().unwrap();
        let keys: Vec<_> = cached.data.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn upsert_replaces_by_key_or_prepends() {
        let transport = Arc::new(MockTransport::new());
        let orch = orchestrator_with(transport, SyncConfig::default());
        orch.cache()
            .write_items(&[make_item("a"), make_item("b")])
            .unwrap();

        // Replace in place.
        let mut replacement = make_item("b");
        replacement.title = "new title".into();
        orch.upsert_item(replacement).unwrap();
        let items = orch.cache().read_items().unwrap().unwrap().data;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].title, "new title");

        // New key prepends.
        orch.upsert_item(make_item("c")).unwrap();
        let items = orch.cache().read_items().unwrap().unwrap().data;
        let keys: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn remote_change_inside_suppression_window_is_dropped() {
        let transport = Arc::new(MockTransport::new());
        transport.push_pull_response(PullResponse::complete(vec![], vec![]));
        let config =
            SyncConfig::default().with_suppression_window(Duration::from_millis(60));
        let orch = orchestrator_with(transport.clone(), config);

        orch.suppress();
        // Arrives at half the window: dropped.
        assert!(!orch.on_remote_change().await.unwrap());
        assert_eq!(transport.pull_count(), 0);

        // Arrives at double the window: reconciles.
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(orch.on_remote_change().await.unwrap());
        assert_eq!(transport.pull_count(), 1);
    }

    #[tokio::test]
    async fn overlapping_refreshes_resolve_by_completion_order() {
        // Two uncoalesced full fetches where the one that started first
        // completes last: its (older) data wins. This documents the
        // accepted weak guarantee rather than fixing it.
        struct DelayedTransport {
            responses: Mutex<Vec<(Duration, PullResponse)>>,
        }

        #[async_trait]
        impl SyncTransport for DelayedTransport {
            async fn pull(&self, _request: PullRequest) -> SyncResult<PullResponse> {
                let (delay, response) = {
                    let mut responses = self.responses.lock();
                    responses.remove(0)
                };
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            async fn create_item(&self, _draft: ItemDraft) -> SyncResult<Item> {
                unimplemented!()
            }
            async fn update_item(&self, _item: Item) -> SyncResult<()> {
                unimplemented!()
            }
            async fn update_item_group(&self, _key: &str, _group: &str) -> SyncResult<()> {
                unimplemented!()
            }
            async fn delete_item(&self, _key: &str) -> SyncResult<()> {
                unimplemented!()
            }
            async fn create_group(&self, _group: Group) -> SyncResult<Group> {
                unimplemented!()
            }
            async fn update_group(&self, _group: Group) -> SyncResult<()> {
                unimplemented!()
            }
            async fn delete_group(&self, _id: &str) -> SyncResult<()> {
                unimplemented!()
            }
            async fn reorder_groups(&self, _ids: Vec<String>) -> SyncResult<()> {
                unimplemented!()
            }
        }

        let transport = Arc::new(DelayedTransport {
            responses: Mutex::new(vec![
                (
                    Duration::from_millis(80),
                    PullResponse::complete(vec![make_item("old")], vec![]),
                ),
                (
                    Duration::from_millis(10),
                    PullResponse::complete(vec![make_item("new")], vec![]),
                ),
            ]),
        });
        let orch = Arc::new(SyncOrchestrator::new(
            Arc::new(MemoryStateStore::new()),
            transport,
            SyncConfig::default(),
        ));

        // First (slow) fetch goes through the Items key, second (fast)
        // through the All key, so they do not coalesce.
        let slow = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.items().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let fast = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.refresh().await })
        };

        fast.await.unwrap().unwrap();
        slow.await.unwrap().unwrap();

        let cached = orch.cache().read_items().unwrap().unwrap().data;
        assert_eq!(cached[0].id, "old", "completion order wins");
    }

    #[tokio::test]
    async fn sign_out_clears_and_notifies() {
        let transport = Arc::new(MockTransport::new());
        let orch = orchestrator_with(transport, SyncConfig::default());
        orch.cache().write_items(&[make_item("a")]).unwrap();
        orch.cache().set_auth_token("tok").unwrap();

        let mut notices = orch.subscribe();
        orch.sign_out().unwrap();

        assert!(orch.cache().read_items().unwrap().is_none());
        assert!(orch.cache().auth_token().unwrap().is_none());
        assert_eq!(notices.recv().await.unwrap(), SyncNotice::SignedOut);
    }
}
