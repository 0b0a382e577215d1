//! Pluggable persistent state storage.
//!
//! The engine persists a handful of string-keyed slots (the two cached
//! collections, their write timestamps, and the auth token). Storage is
//! injected so the cache layer stays unit-testable and the host can
//! back it with whatever it has (extension storage, a file, a DB row).

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A string-keyed slot store.
pub trait StateStore: Send + Sync {
    /// Reads a slot. `None` when the slot has never been written.
    fn get(&self, key: &str) -> SyncResult<Option<String>>;

    /// Writes a slot, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> SyncResult<()>;

    /// Removes a slot. Removing an absent slot is a no-op.
    fn remove(&self, key: &str) -> SyncResult<()>;
}

/// An in-memory state store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns true if no slots are occupied.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> SyncResult<()> {
        self.slots.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        self.slots.lock().remove(key);
        Ok(())
    }
}

/// A file-backed state store: one JSON object per file, rewritten on
/// every put/remove. Slots are small, so wholesale rewrites are fine.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    slots: Mutex<HashMap<String, String>>,
}

impl FileStateStore {
    /// Opens a store at `path`, loading existing slots if the file is
    /// present. A corrupt file is treated as empty rather than fatal.
    pub fn open(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref().to_path_buf();
        let slots = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(SyncError::Storage(err.to_string())),
        };
        Ok(Self {
            path,
            slots: Mutex::new(slots),
        })
    }

    fn flush(&self, slots: &HashMap<String, String>) -> SyncResult<()> {
        let contents =
            serde_json::to_string(slots).map_err(|e| SyncError::Storage(e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(|e| SyncError::Storage(e.to_string()))
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> SyncResult<()> {
        let mut slots = self.slots.lock();
        slots.insert(key.to_string(), value.to_string());
        self.flush(&slots)
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        let mut slots = self.slots.lock();
        if slots.remove(key).is_some() {
            self.flush(&slots)?;
        }
        Ok(())
    }
}
