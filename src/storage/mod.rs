//! Storage module for whole-table persistence using Sled.
//!
//! Each table lives in its own Sled tree as an ordered list of JSON rows.
//! The only write operation is a full replace: every existing row is removed
//! and the posted rows are inserted in order, in one batch. Soft-deleted rows
//! are kept as tombstones and filtered out on read.

mod sled_store;

pub use sled_store::{StoreError, StoreResult, TableStore};

use serde::{Deserialize, Serialize};

use crate::records::TableKind;

/// Metadata stored alongside each table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table wire name
    pub table: String,
    /// Unix timestamp of the last replace
    pub updated_at: i64,
    /// Rows stored, tombstones included
    pub row_count: u64,
    /// Rows stored with the deleted flag set
    pub tombstone_count: u64,
    /// Number of replaces since the table was created
    pub replace_count: u64,
}

impl TableMetadata {
    pub fn new(table: TableKind) -> Self {
        Self {
            table: table.name().to_string(),
            updated_at: chrono::Utc::now().timestamp(),
            row_count: 0,
            tombstone_count: 0,
            replace_count: 0,
        }
    }

    /// Live (non-deleted) rows
    pub fn live_count(&self) -> u64 {
        self.row_count.saturating_sub(self.tombstone_count)
    }
}

/// Configuration for the storage layer
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to the Sled database directory
    pub path: String,
    /// Cache size in bytes (default: 256MB)
    pub cache_size: u64,
    /// Flush interval in milliseconds (0 = flush only on request)
    pub flush_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "./data/calltrack.sled".to_string(),
            cache_size: 256 * 1024 * 1024,
            flush_interval_ms: 500,
        }
    }
}

impl StorageConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_flush_interval(mut self, ms: u64) -> Self {
        self.flush_interval_ms = ms;
        self
    }
}
