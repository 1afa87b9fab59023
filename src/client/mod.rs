//! Client side of the tracker.
//!
//! A [`Workspace`] owns one [`TableController`] per table, all writing
//! through the same [`Gateway`]. [`listener::follow`] keeps a shared
//! workspace current by reloading whatever the server reports as changed.

pub mod controller;
pub mod gateway;
pub mod listener;

pub use controller::{TableController, SELECT_AT_LEAST_ONE};
pub use gateway::{Gateway, HttpGateway, LocalGateway};
pub use listener::{follow, SyncListener};

use std::sync::Arc;
use tracing::info;

use crate::error::AppResult;
use crate::records::{self, CallRecord, ProgressRecord, TableKind, UploadRecord};

pub struct Workspace {
    pub calls: TableController<CallRecord>,
    pub progress: TableController<ProgressRecord>,
    pub uploads: TableController<UploadRecord>,
}

impl Workspace {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            calls: TableController::new(gateway.clone()),
            progress: TableController::new(gateway.clone()),
            uploads: TableController::new(gateway),
        }
    }

    pub async fn reload(&mut self, table: TableKind) -> AppResult<()> {
        match table {
            TableKind::Calls => self.calls.load().await,
            TableKind::Progress => self.progress.load().await,
            TableKind::Uploads => self.uploads.load().await,
        }
    }

    /// Reload every table. Each table is attempted; the first failure is
    /// returned.
    pub async fn reload_all(&mut self) -> AppResult<()> {
        let mut first_error = None;
        for table in TableKind::ALL {
            if let Err(e) = self.reload(table).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                info!(
                    "Loaded {} calls, {} progress rows, {} uploads",
                    self.calls.len(),
                    self.progress.len(),
                    self.uploads.len()
                );
                Ok(())
            }
        }
    }

    /// Default `verified` value for a new progress row
    pub fn verified_for(&self, user_id: &str) -> String {
        records::verified_for(user_id, self.calls.records())
    }

    /// Save a progress row, filling a blank `verified` from the calls table.
    pub async fn save_progress(
        &mut self,
        mut record: ProgressRecord,
        edit_index: Option<usize>,
    ) -> AppResult<()> {
        if record.verified.trim().is_empty() {
            record.verified = self.verified_for(&record.user_id);
        }
        self.progress.save(record, edit_index).await
    }
}
