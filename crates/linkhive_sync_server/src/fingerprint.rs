//! Cheap aggregate fingerprints of server state.
//!
//! The polling fallback detects changes made outside this process
//! (another device, another replica) by comparing a small derived
//! summary instead of the full dataset. A differing fingerprint yields
//! a coarse "something changed" event, not a diff.

use crate::error::RelayResult;
use async_trait::async_trait;
use linkhive_sync_protocol::Group;

/// A derived summary of one user's server-side state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    /// Total item count.
    pub item_count: u64,
    /// Most recent item creation time, unix milliseconds.
    pub latest_created_at: i64,
    /// Most recent item update time, unix milliseconds.
    pub latest_updated_at: i64,
    /// Serialized group summaries, order-sensitive.
    pub group_summary: String,
}

impl Fingerprint {
    /// Serializes group summaries into the order-sensitive field.
    pub fn summarize_groups(groups: &[Group]) -> String {
        groups
            .iter()
            .map(|g| format!("{}:{}:{}:{}:{}", g.id, g.name, g.color, g.order, g.count))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Computes fingerprints from the backing store.
///
/// The store itself (schema, queries) is outside this crate; the relay
/// only needs this one cheap aggregate per poll tick.
#[async_trait]
pub trait FingerprintSource: Send + Sync {
    /// Computes the current fingerprint for a user.
    async fn fingerprint(&self, user_id: &str) -> RelayResult<Fingerprint>;
}
