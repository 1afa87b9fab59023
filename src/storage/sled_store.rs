//! Sled-based storage implementation for the tracked tables.
//!
//! Layout:
//! - one tree per table, keyed by the row position as a big-endian `u64`,
//!   values are the JSON-encoded rows
//! - a metadata tree keyed by table name, values are bincode-encoded
//!   [`TableMetadata`]
//!
//! A replace removes every key and inserts the new rows in a single batch,
//! so readers see either the old table or the new one.

use parking_lot::Mutex;
use sled::{Batch, Db, Tree};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::{StorageConfig, TableMetadata};
use crate::records::{Record, TableKind};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Sled database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Metadata serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Row encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage initialization failed: {0}")]
    InitFailed(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

const TREE_METADATA: &str = "metadata";

fn tree_name(table: TableKind) -> String {
    format!("table:{}", table.name())
}

/// Sled-based store holding the three tables
#[derive(Clone)]
pub struct TableStore {
    db: Arc<Db>,
    tables: [Tree; 3],
    metadata: Tree,
    /// Serializes replaces per table so that post-commit hooks run in
    /// commit order
    write_locks: Arc<[Mutex<()>; 3]>,
}

impl TableStore {
    /// Open or create a store at the configured path
    pub fn open(config: StorageConfig) -> StoreResult<Self> {
        let path = Path::new(&config.path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::InitFailed(format!("Failed to create directory: {}", e))
            })?;
        }

        let db = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_size)
            .flush_every_ms(if config.flush_interval_ms > 0 {
                Some(config.flush_interval_ms)
            } else {
                None
            })
            .open()?;

        let tables = [
            db.open_tree(tree_name(TableKind::Calls))?,
            db.open_tree(tree_name(TableKind::Progress))?,
            db.open_tree(tree_name(TableKind::Uploads))?,
        ];
        let metadata = db.open_tree(TREE_METADATA)?;

        Ok(Self {
            db: Arc::new(db),
            tables,
            metadata,
            write_locks: Arc::new([Mutex::new(()), Mutex::new(()), Mutex::new(())]),
        })
    }

    fn tree(&self, table: TableKind) -> &Tree {
        &self.tables[table.index()]
    }

    /// Replace the whole table with `rows`, keeping their order.
    pub fn replace_all<R: Record>(&self, rows: &[R]) -> StoreResult<TableMetadata> {
        self.replace_all_with(rows, |_| {})
    }

    /// Replace the whole table, then run `after_commit` while still holding
    /// the table's write lock. `after_commit` runs whenever the rows were
    /// committed, even if the metadata update then fails.
    pub fn replace_all_with<R, F>(&self, rows: &[R], after_commit: F) -> StoreResult<TableMetadata>
    where
        R: Record,
        F: FnOnce(&TableMetadata),
    {
        let table = R::KIND;
        let _guard = self.write_locks[table.index()].lock();
        let tree = self.tree(table);

        let mut batch = Batch::default();
        for key in tree.iter().keys() {
            batch.remove(key?);
        }

        let mut tombstones = 0u64;
        for (position, row) in rows.iter().enumerate() {
            if row.is_deleted() {
                tombstones += 1;
            }
            let key = (position as u64).to_be_bytes().to_vec();
            batch.insert(key, serde_json::to_vec(row)?);
        }

        tree.apply_batch(batch)?;

        // The rows are committed; a metadata failure must not hide that.
        let previous = self.get_metadata(table);
        let mut meta = match &previous {
            Ok(Some(meta)) => meta.clone(),
            _ => TableMetadata::new(table),
        };
        meta.updated_at = chrono::Utc::now().timestamp();
        meta.row_count = rows.len() as u64;
        meta.tombstone_count = tombstones;
        meta.replace_count += 1;
        let saved = previous.and_then(|_| self.save_metadata(&meta));

        debug!(
            "Replaced table {}: {} rows ({} tombstones)",
            table, meta.row_count, meta.tombstone_count
        );

        after_commit(&meta);
        saved?;
        Ok(meta)
    }

    /// All rows that are not soft-deleted, in stored order
    pub fn list_active<R: Record>(&self) -> StoreResult<Vec<R>> {
        Ok(self
            .list_all::<R>()?
            .into_iter()
            .filter(|row| !row.is_deleted())
            .collect())
    }

    /// All rows including tombstones, in stored order
    pub fn list_all<R: Record>(&self) -> StoreResult<Vec<R>> {
        let mut rows = Vec::new();
        for item in self.tree(R::KIND).iter() {
            let (_, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    /// Save table metadata
    pub fn save_metadata(&self, meta: &TableMetadata) -> StoreResult<()> {
        let bytes = bincode::serialize(meta)?;
        self.metadata.insert(meta.table.as_bytes(), bytes)?;
        Ok(())
    }

    /// Load table metadata
    pub fn get_metadata(&self, table: TableKind) -> StoreResult<Option<TableMetadata>> {
        match self.metadata.get(table.name().as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Force flush all pending writes to disk
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> StoreResult<StorageStats> {
        let mut tables = Vec::with_capacity(TableKind::ALL.len());
        for table in TableKind::ALL {
            tables.push(
                self.get_metadata(table)?
                    .unwrap_or_else(|| TableMetadata::new(table)),
            );
        }
        Ok(StorageStats {
            tables,
            total_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }
}

/// Statistics about the storage
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub tables: Vec<TableMetadata>,
    pub total_size_bytes: u64,
}

impl Drop for TableStore {
    fn drop(&mut self) {
        // Attempt to flush on drop, but don't panic
        let _ = self.flush();
    }
}
