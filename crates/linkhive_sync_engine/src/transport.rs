//! Transport abstraction for pull and mutation calls.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use linkhive_sync_protocol::{Group, IdentityKeyed, Item, ItemDraft, PullRequest, PullResponse};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Network operations against the remote authoritative store.
///
/// One-shot calls: transient failures surface as errors with no retry
/// here, leaving retry policy to the caller. Only the realtime stream
/// retries on its own.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Pulls a reconciliation page.
    async fn pull(&self, request: PullRequest) -> SyncResult<PullResponse>;

    /// Creates an item; the server assigns identity and may regroup it.
    async fn create_item(&self, draft: ItemDraft) -> SyncResult<Item>;

    /// Updates an item wholesale.
    async fn update_item(&self, item: Item) -> SyncResult<()>;

    /// Moves an item to a different group.
    async fn update_item_group(&self, key: &str, group_name: &str) -> SyncResult<()>;

    /// Deletes an item.
    async fn delete_item(&self, key: &str) -> SyncResult<()>;

    /// Creates a group.
    async fn create_group(&self, group: Group) -> SyncResult<Group>;

    /// Updates a group.
    async fn update_group(&self, group: Group) -> SyncResult<()>;

    /// Deletes a group.
    async fn delete_group(&self, id: &str) -> SyncResult<()>;

    /// Reorders groups to match the given id order.
    async fn reorder_groups(&self, ids: Vec<String>) -> SyncResult<()>;
}

/// A mock transport for testing.
///
/// Pull responses are served from a queue; when the queue is empty the
/// last scripted response repeats. Every call is counted and recorded.
#[derive(Default)]
pub struct MockTransport {
    pull_responses: Mutex<VecDeque<PullResponse>>,
    last_pull_response: Mutex<Option<PullResponse>>,
    pull_requests: Mutex<Vec<PullRequest>>,
    fail_with: Mutex<Option<SyncError>>,
    fail_after_pulls: Mutex<Option<(usize, SyncError)>>,
    mutation_log: Mutex<Vec<String>>,
    next_id: Mutex<u64>,
}

impl MockTransport {
    /// Creates a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a pull response.
    pub fn push_pull_response(&self, response: PullResponse) {
        self.pull_responses.lock().push_back(response);
    }

    /// Makes every call fail with the given error.
    pub fn fail_with(&self, error: SyncError) {
        *self.fail_with.lock() = Some(error);
    }

    /// Clears any injected failure.
    pub fn clear_failure(&self) {
        *self.fail_with.lock() = None;
    }

    /// Makes pull calls after the first `n` fail with the given error.
    pub fn fail_after_pulls(&self, n: usize, error: SyncError) {
        *self.fail_after_pulls.lock() = Some((n, error));
    }

    /// Number of pull calls made so far.
    pub fn pull_count(&self) -> usize {
        self.pull_requests.lock().len()
    }

    /// All pull requests received, in order.
    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.pull_requests.lock().clone()
    }

    /// Names of mutation calls received, in order.
    pub fn mutation_log(&self) -> Vec<String> {
        self.mutation_log.lock().clone()
    }

    fn check_failure(&self) -> SyncResult<()> {
        match self.fail_with.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn log(&self, call: impl Into<String>) {
        self.mutation_log.lock().push(call.into());
    }
}

#[async_trait]
impl SyncTransport for MockTransport {
    async fn pull(&self, request: PullRequest) -> SyncResult<PullResponse> {
        self.pull_requests.lock().push(request);
        self.check_failure()?;
        if let Some((n, err)) = self.fail_after_pulls.lock().clone() {
            if self.pull_requests.lock().len() > n {
                return Err(err);
            }
        }

        let next = self.pull_responses.lock().pop_front();
        if let Some(response) = next {
            *self.last_pull_response.lock() = Some(response.clone());
            return Ok(response);
        }
        self.last_pull_response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Server("no mock pull response set".into()))
    }

    async fn create_item(&self, draft: ItemDraft) -> SyncResult<Item> {
        self.log(format!("create_item {}", draft.url));
        self.check_failure()?;

        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            format!("srv-{next}")
        };
        Ok(Item {
            id,
            url: draft.url,
            title: draft.title,
            description: draft.description,
            icon_url: draft.icon_url,
            preview_url: None,
            created_at: 1,
            group_name: draft.group_name,
            group_color: None,
        })
    }

    async fn update_item(&self, item: Item) -> SyncResult<()> {
        self.log(format!("update_item {}", item.identity_key()));
        self.check_failure()
    }

    async fn update_item_group(&self, key: &str, group_name: &str) -> SyncResult<()> {
        self.log(format!("update_item_group {key} -> {group_name}"));
        self.check_failure()
    }

    async fn delete_item(&self, key: &str) -> SyncResult<()> {
        self.log(format!("delete_item {key}"));
        self.check_failure()
    }

    async fn create_group(&self, group: Group) -> SyncResult<Group> {
        self.log(format!("create_group {}", group.name));
        self.check_failure()?;
        Ok(group)
    }

    async fn update_group(&self, group: Group) -> SyncResult<()> {
        self.log(format!("update_group {}", group.id));
        self.check_failure()
    }

    async fn delete_group(&self, id: &str) -> SyncResult<()> {
        self.log(format!("delete_group {id}"));
        self.check_failure()
    }

    async fn reorder_groups(&self, ids: Vec<String>) -> SyncResult<()> {
        self.log(format!("reorder_groups {}", ids.join(",")));
        self.check_failure()
    }
}
