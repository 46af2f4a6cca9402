//! # redb-backed Queue Storage
//!
//! Persists encoded tab queue records in a single redb table, giving crash
//! safety and atomic replacement of a tab's record on every write.

use super::QueueStore;
use crate::AtomlensError;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for tab queues: storage key -> encoded `TabQueueRecord`.
const TAB_QUEUES: TableDefinition<&str, &[u8]> = TableDefinition::new("tab_queues");

fn storage_err(e: impl std::fmt::Display) -> AtomlensError {
    AtomlensError::Storage(e.to_string())
}

/// A disk-backed queue store using redb.
pub struct RedbQueueStore {
    db: Database,
}

impl std::fmt::Debug for RedbQueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbQueueStore").finish_non_exhaustive()
    }
}

impl RedbQueueStore {
    /// Open or create a queue database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AtomlensError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Create the table up front so readers never see it missing
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(TAB_QUEUES).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        Ok(Self { db })
    }
}

impl QueueStore for RedbQueueStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, AtomlensError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(TAB_QUEUES).map_err(storage_err)?;
        Ok(table
            .get(key)
            .map_err(storage_err)?
            .map(|v| v.value().to_vec()))
    }

    fn save(&mut self, key: &str, value: &[u8]) -> Result<(), AtomlensError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(TAB_QUEUES).map_err(storage_err)?;
            table.insert(key, value).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)
    }

    fn delete(&mut self, key: &str) -> Result<(), AtomlensError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(TAB_QUEUES).map_err(storage_err)?;
            table.remove(key).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)
    }

    fn keys(&self) -> Result<Vec<String>, AtomlensError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(TAB_QUEUES).map_err(storage_err)?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, _) = entry.map_err(storage_err)?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}
