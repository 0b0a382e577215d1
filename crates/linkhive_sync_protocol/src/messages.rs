//! Protocol messages for pull, mutation, and the UI ↔ engine bridge.

use crate::model::{Group, Item};
use serde::{Deserialize, Serialize};

/// Fetch strategy requested from the pull endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Progressive hydration: small first page, cursor-driven follow-ups.
    Initial,
    /// Single request bounded only by the server-side cap.
    Full,
}

/// A pull/reconciliation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// Fetch strategy.
    pub mode: FetchMode,
    /// Opaque cursor: the identity key of the last row seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Requested page size; the server clamps this to its hard cap.
    pub limit: u32,
}

impl PullRequest {
    /// Creates a full-fetch request.
    pub fn full(limit: u32) -> Self {
        Self {
            mode: FetchMode::Full,
            cursor: None,
            limit,
        }
    }

    /// Creates an initial (progressive) request page.
    pub fn initial(cursor: Option<String>, limit: u32) -> Self {
        Self {
            mode: FetchMode::Initial,
            cursor,
            limit,
        }
    }
}

/// A pull/reconciliation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    /// Items in this page.
    pub items: Vec<Item>,
    /// Groups; populated on every response, cheap relative to items.
    pub groups: Vec<Group>,
    /// Whether more pages remain.
    pub has_more: bool,
    /// Cursor for the next page, when `has_more` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl PullResponse {
    /// Creates a terminal response carrying everything.
    pub fn complete(items: Vec<Item>, groups: Vec<Group>) -> Self {
        Self {
            items,
            groups,
            has_more: false,
            next_cursor: None,
        }
    }

    /// Creates an intermediate page with a continuation cursor.
    pub fn page(items: Vec<Item>, groups: Vec<Group>, next_cursor: impl Into<String>) -> Self {
        Self {
            items,
            groups,
            has_more: true,
            next_cursor: Some(next_cursor.into()),
        }
    }
}

/// A not-yet-saved item, as submitted by the UI.
///
/// Identity is server-assigned, so a draft never carries an `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    /// The URL to bookmark.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional favicon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    /// Requested group label; the server may reassign it.
    #[serde(default)]
    pub group_name: String,
}

/// A request from the UI process to the sync engine.
///
/// This is a closed set: the bridge matches it exhaustively, so adding
/// a variant forces every handler to be updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum EngineRequest {
    /// Fetch both collections, serving from cache when fresh.
    FetchAll,
    /// Save a new item.
    Save(ItemDraft),
    /// Update an existing item wholesale.
    Update(Item),
    /// Move an item to a different group.
    #[serde(rename_all = "camelCase")]
    UpdateCategory {
        /// Identity key of the item to move.
        key: String,
        /// Target group name.
        group_name: String,
    },
    /// Delete an item.
    Delete {
        /// Identity key of the item to delete.
        key: String,
    },
    /// Force a full reconciliation, bypassing cache freshness.
    Refresh,
    /// Sign out: stop realtime, clear every persisted slot.
    ForceLogout,
}

/// A response from the sync engine to the UI process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum EngineResponse {
    /// Both collections, for `FetchAll` and `Refresh`.
    Collections {
        /// Cached or freshly fetched items.
        items: Vec<Item>,
        /// Cached or freshly fetched groups.
        groups: Vec<Group>,
    },
    /// The server-confirmed row for a `Save`.
    Saved(Item),
    /// Acknowledgement for requests with no payload to return.
    Done,
    /// The request failed.
    Failed {
        /// True when the remote rejected the caller's credentials.
        /// Distinct from other failures: the engine has already cleared
        /// local state and the UI must surface a sign-out.
        unauthorized: bool,
        /// Human-readable failure description.
        message: String,
    },
}

impl EngineResponse {
    /// Creates a failure response for an ordinary (non-auth) error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            unauthorized: false,
            message: message.into(),
        }
    }

    /// Creates the failure response for rejected credentials.
    pub fn unauthorized() -> Self {
        Self::Failed {
            unauthorized: true,
            message: "unauthorized".into(),
        }
    }
}
