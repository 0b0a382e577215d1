//! The persistent collection cache.
//!
//! Two collections (items, groups) with independent TTLs, each stored
//! as a JSON blob plus a last-write timestamp. Writes are wholesale
//! replaces; there are no field-level merges.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::store::StateStore;
use linkhive_sync_protocol::{Group, Item};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Slot key for the auth token.
const AUTH_TOKEN_SLOT: &str = "auth_token";

/// A cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Bookmarked items.
    Items,
    /// Bookmark groups.
    Groups,
}

impl Collection {
    /// Slot key holding the collection data.
    fn data_slot(&self) -> &'static str {
        match self {
            Collection::Items => "items",
            Collection::Groups => "groups",
        }
    }

    /// Slot key holding the collection's last-write timestamp.
    fn stamp_slot(&self) -> &'static str {
        match self {
            Collection::Items => "items_written_at",
            Collection::Groups => "groups_written_at",
        }
    }
}

/// The result of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRead<T> {
    /// The cached rows.
    pub data: Vec<T>,
    /// True when `now - written_at` is within the collection's TTL.
    pub is_fresh: bool,
}

/// The persistent cache over an injected state store.
pub struct CacheStore {
    store: Arc<dyn StateStore>,
    items_ttl: Duration,
    groups_ttl: Duration,
}

impl CacheStore {
    /// Creates a cache over `store` with TTLs from `config`.
    pub fn new(store: Arc<dyn StateStore>, config: &SyncConfig) -> Self {
        Self {
            store,
            items_ttl: config.items_ttl,
            groups_ttl: config.groups_ttl,
        }
    }

    fn ttl(&self, collection: Collection) -> Duration {
        match collection {
            Collection::Items => self.items_ttl,
            Collection::Groups => self.groups_ttl,
        }
    }

    fn read<T: DeserializeOwned>(&self, collection: Collection) -> SyncResult<Option<CachedRead<T>>> {
        let Some(raw) = self.store.get(collection.data_slot())? else {
            return Ok(None);
        };
        let data: Vec<T> = serde_json::from_str(&raw)?;

        let written_at = self
            .store
            .get(collection.stamp_slot())?
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        let age = now_ms().saturating_sub(written_at);
        let is_fresh = age < self.ttl(collection).as_millis() as u64;

        Ok(Some(CachedRead { data, is_fresh }))
    }

    fn write<T: Serialize>(&self, collection: Collection, data: &[T]) -> SyncResult<()> {
        let raw = serde_json::to_string(data)?;
        self.store.put(collection.data_slot(), &raw)?;
        self.store
            .put(collection.stamp_slot(), &now_ms().to_string())
    }

    /// Reads the cached items, if any, with a freshness verdict.
    pub fn read_items(&self) -> SyncResult<Option<CachedRead<Item>>> {
        self.read(Collection::Items)
    }

    /// Replaces the cached items wholesale and stamps the write time.
    pub fn write_items(&self, items: &[Item]) -> SyncResult<()> {
        self.write(Collection::Items, items)
    }

    /// Reads the cached groups, if any, with a freshness verdict.
    pub fn read_groups(&self) -> SyncResult<Option<CachedRead<Group>>> {
        self.read(Collection::Groups)
    }

    /// Replaces the cached groups wholesale and stamps the write time.
    pub fn write_groups(&self, groups: &[Group]) -> SyncResult<()> {
        self.write(Collection::Groups, groups)
    }

    /// Clears both cached collections and their timestamps.
    pub fn clear(&self) -> SyncResult<()> {
        for collection in [Collection::Items, Collection::Groups] {
            self.store.remove(collection.data_slot())?;
            self.store.remove(collection.stamp_slot())?;
        }
        Ok(())
    }

    /// Clears everything including the auth token. Mandatory on logout
    /// so a subsequent user never sees the previous user's data.
    pub fn clear_all(&self) -> SyncResult<()> {
        self.clear()?;
        self.store.remove(AUTH_TOKEN_SLOT)
    }

    /// Reads the persisted auth token.
    pub fn auth_token(&self) -> SyncResult<Option<String>> {
        self.store.get(AUTH_TOKEN_SLOT)
    }

    /// Persists the auth token.
    pub fn set_auth_token(&self, token: &str) -> SyncResult<()> {
        self.store.put(AUTH_TOKEN_SLOT, token)
    }
}

/// Current wall-clock time, unix milliseconds.
pub(crate) fn now_ms() -> u64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
