//! # Storage Module
//!
//! Key-value persistence for tab queue records.
//!
//! Records live under `tab_queue_<tabId>`; the value is the encoded record
//! produced by `formats::record_to_bytes`. Two backends are provided:
//! - `MemoryQueueStore`: volatile, for tests and `--ephemeral` runs
//! - `RedbQueueStore`: ACID, on disk

mod redb_store;

pub use redb_store::RedbQueueStore;

use crate::primitives::STORAGE_KEY_PREFIX;
use crate::{AtomlensError, TabId};
use std::collections::BTreeMap;
use std::path::Path;

/// Key under which a tab's queue is persisted.
#[must_use]
pub fn storage_key(tab: TabId) -> String {
    format!("{STORAGE_KEY_PREFIX}{tab}")
}

/// Inverse of [`storage_key`]. Returns `None` for foreign keys.
#[must_use]
pub fn tab_from_key(key: &str) -> Option<TabId> {
    key.strip_prefix(STORAGE_KEY_PREFIX)?
        .parse::<u64>()
        .ok()
        .map(TabId)
}

/// Host key-value store contract.
pub trait QueueStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, AtomlensError>;

    /// Write a value, replacing any previous one.
    fn save(&mut self, key: &str, value: &[u8]) -> Result<(), AtomlensError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&mut self, key: &str) -> Result<(), AtomlensError>;

    /// Every stored key, ascending.
    fn keys(&self) -> Result<Vec<String>, AtomlensError>;
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Volatile store backed by a `BTreeMap`.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueueStore {
    entries: BTreeMap<String, Vec<u8>>,
    writes: u64,
}

impl MemoryQueueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl QueueStore for MemoryQueueStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, AtomlensError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &[u8]) -> Result<(), AtomlensError> {
        self.entries.insert(key.to_string(), value.to_vec());
        self.writes = self.writes.saturating_add(1);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), AtomlensError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, AtomlensError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

// =============================================================================
// BACKEND SELECTION
// =============================================================================

/// Storage backend for a queue manager.
#[derive(Debug)]
pub enum QueueStorage {
    /// In-memory store (fast, volatile).
    InMemory(MemoryQueueStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbQueueStore),
}

impl Default for QueueStorage {
    fn default() -> Self {
        Self::InMemory(MemoryQueueStore::new())
    }
}

// NOTE: QueueStorage does NOT implement Clone; a redb handle cannot be cloned.

impl QueueStorage {
    /// Open (or create) a redb-backed store.
    pub fn redb(path: impl AsRef<Path>) -> Result<Self, AtomlensError> {
        RedbQueueStore::open(path).map(Self::Persistent)
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }
}

impl QueueStore for QueueStorage {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, AtomlensError> {
        match self {
            Self::InMemory(s) => s.load(key),
            Self::Persistent(s) => s.load(key),
        }
    }

    fn save(&mut self, key: &str, value: &[u8]) -> Result<(), AtomlensError> {
        match self {
            Self::InMemory(s) => s.save(key, value),
            Self::Persistent(s) => s.save(key, value),
        }
    }

    fn delete(&mut self, key: &str) -> Result<(), AtomlensError> {
        match self {
            Self::InMemory(s) => s.delete(key),
            Self::Persistent(s) => s.delete(key),
        }
    }

    fn keys(&self) -> Result<Vec<String>, AtomlensError> {
        match self {
            Self::InMemory(s) => s.keys(),
            Self::Persistent(s) => s.keys(),
        }
    }
}
