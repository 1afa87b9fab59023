//! Per-table client state: the in-memory rows, the selection and the view.
//!
//! Every mutation edits the local list, recomputes derived fields and then
//! writes the whole list back through the [`Gateway`]. If the write fails the
//! list is put back the way it was before the mutation.

use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::gateway::Gateway;
use crate::error::{AppError, AppResult};
use crate::records::{today, Record};
use crate::sheet::{self, Export, ImportContext, SheetRecord};
use crate::view::{Page, TableView};

/// Shown when a bulk action runs with nothing selected
pub const SELECT_AT_LEAST_ONE: &str = "გთხოვთ აირჩიოთ მინიმუმ ერთი ჩანაწერი.";

pub struct TableController<R: Record> {
    gateway: Arc<dyn Gateway>,
    records: Vec<R>,
    /// Indices into `records`
    selected: BTreeSet<usize>,
    pub view: TableView,
}

impl<R: Record> TableController<R> {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            records: Vec::new(),
            selected: BTreeSet::new(),
            view: TableView::new(),
        }
    }

    /// Rows in memory, newest first, tombstones included
    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&R> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current page of the view
    pub fn page(&self) -> Page {
        self.view.page(&self.records)
    }

    /// Replace the in-memory rows with the live rows from the gateway. On
    /// failure the rows already in memory are kept.
    pub async fn load(&mut self) -> AppResult<()> {
        let values = self.gateway.fetch_table(R::KIND).await.map_err(|e| {
            warn!("Failed to load {} table: {}", R::KIND, e);
            e
        })?;

        let mut records = values
            .into_iter()
            .map(serde_json::from_value::<R>)
            .collect::<Result<Vec<_>, _>>()?;
        R::refresh_derived(&mut records);

        self.records = records;
        let len = self.records.len();
        self.selected.retain(|&index| index < len);

        debug!("Loaded {} table: {} rows", R::KIND, len);
        Ok(())
    }

    /// Add `record` as the newest row, or replace the row at `edit_index`.
    pub async fn save(&mut self, mut record: R, edit_index: Option<usize>) -> AppResult<()> {
        record.prepare(today())?;

        let snapshot = self.records.clone();
        match edit_index {
            Some(index) if index < self.records.len() => self.records[index] = record,
            Some(index) => {
                return Err(AppError::Validation(format!(
                    "No {} record at position {}",
                    R::KIND,
                    index
                )))
            }
            None => {
                self.records.insert(0, record);
                self.shift_selection(1);
            }
        }

        self.persist(snapshot).await
    }

    /// Mark the row at `index` deleted. Out-of-range indices do nothing.
    pub async fn soft_delete(&mut self, index: usize) -> AppResult<()> {
        if index >= self.records.len() {
            return Ok(());
        }

        let snapshot = self.records.clone();
        self.records[index].mark_deleted();
        self.selected.remove(&index);
        self.persist(snapshot).await
    }

    /// Mark every row in `indices` deleted with a single write.
    pub async fn bulk_soft_delete(&mut self, indices: &[usize]) -> AppResult<()> {
        if indices.is_empty() {
            return Err(AppError::Validation(SELECT_AT_LEAST_ONE.to_string()));
        }

        let mut ordered: Vec<usize> = indices.to_vec();
        ordered.sort_unstable_by(|a, b| b.cmp(a));
        ordered.dedup();

        let snapshot = self.records.clone();
        for index in ordered {
            if let Some(record) = self.records.get_mut(index) {
                record.mark_deleted();
                self.selected.remove(&index);
            }
        }
        self.persist(snapshot).await
    }

    /// Delete the selected rows
    pub async fn delete_selected(&mut self) -> AppResult<()> {
        let indices: Vec<usize> = self.selected.iter().copied().collect();
        self.bulk_soft_delete(&indices).await?;
        self.selected.clear();
        Ok(())
    }

    pub fn selected(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    /// Select a row. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) {
        if index < self.records.len() {
            self.selected.insert(index);
        }
    }

    pub fn deselect(&mut self, index: usize) {
        self.selected.remove(&index);
    }

    pub fn toggle(&mut self, index: usize) {
        if !self.selected.remove(&index) {
            self.select(index);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    fn shift_selection(&mut self, by: usize) {
        self.selected = self.selected.iter().map(|index| index + by).collect();
    }

    async fn persist(&mut self, snapshot: Vec<R>) -> AppResult<()> {
        R::refresh_derived(&mut self.records);

        let result = match self
            .records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()
        {
            Ok(rows) => self.gateway.replace_table(R::KIND, rows).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            warn!("Failed to save {} table: {}", R::KIND, e);
            self.records = snapshot;
            let len = self.records.len();
            self.selected.retain(|&index| index < len);
            return Err(e);
        }
        Ok(())
    }
}

impl<R: SheetRecord> TableController<R> {
    /// Add every row of a workbook, each one prepended in sheet order, and
    /// save once. Returns the number of rows imported.
    pub async fn import_xlsx(&mut self, bytes: &[u8]) -> AppResult<usize> {
        let rows: Vec<R> = sheet::import(bytes, &ImportContext::now())?;
        if rows.is_empty() {
            info!("Workbook had no {} rows to import", R::KIND);
            return Ok(0);
        }

        let count = rows.len();
        let snapshot = self.records.clone();
        for row in rows {
            self.records.insert(0, row);
        }
        self.shift_selection(count);

        self.persist(snapshot).await?;
        info!("Imported {} rows into {} table", count, R::KIND);
        Ok(count)
    }

    /// Export the selected rows
    pub fn export_selected(&self) -> AppResult<Export> {
        self.export_indices(self.selected.iter().copied())
    }

    /// Export the rows at `indices` in ascending order. Out-of-range indices
    /// are skipped.
    pub fn export_indices(&self, indices: impl IntoIterator<Item = usize>) -> AppResult<Export> {
        let indices: BTreeSet<usize> = indices
            .into_iter()
            .filter(|&index| index < self.records.len())
            .collect();
        if indices.is_empty() {
            return Err(AppError::Validation(SELECT_AT_LEAST_ONE.to_string()));
        }

        Ok(sheet::export(indices.iter().map(|&index| &self.records[index]))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AppState;
    use crate::client::gateway::LocalGateway;
    use crate::records::{CallRecord, ProgressRecord, TableKind, UploadRecord};
    use crate::storage::{StorageConfig, TableStore};
    use async_trait::async_trait;
    use chrono::Duration;
    use tempfile::tempdir;

    struct Offline;

    #[async_trait]
    impl Gateway for Offline {
        async fn fetch_table(&self, _table: TableKind) -> AppResult<Vec<Value>> {
            Err(AppError::Transport("offline".to_string()))
        }

        async fn replace_table(&self, _table: TableKind, _rows: Vec<Value>) -> AppResult<()> {
            Err(AppError::Transport("offline".to_string()))
        }
    }

    fn local(dir: &tempfile::TempDir) -> (Arc<AppState>, Arc<dyn Gateway>) {
        let config = StorageConfig::new(dir.path().join("client.sled").to_string_lossy().to_string())
            .with_flush_interval(0);
        let state = Arc::new(AppState::new(TableStore::open(config).unwrap()));
        (state.clone(), Arc::new(LocalGateway::new(state)))
    }

    fn day(offset: i64) -> String {
        (today() + Duration::days(offset)).format("%Y-%m-%d").to_string()
    }

    fn call(user_id: &str) -> CallRecord {
        CallRecord {
            call_date: day(1),
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    fn progress(user_id: &str, result: &str) -> ProgressRecord {
        ProgressRecord {
            date: "2024-01-10".to_string(),
            hour: "09:00".to_string(),
            user_id: user_id.to_string(),
            result: result.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_prepends_and_reloads() {
        let dir = tempdir().unwrap();
        let (_state, gateway) = local(&dir);
        let mut calls = TableController::<CallRecord>::new(gateway.clone());

        calls.save(call("1"), None).await.unwrap();
        calls.save(call("2"), None).await.unwrap();
        assert_eq!(calls.records()[0].user_id, "2");

        let mut other = TableController::<CallRecord>::new(gateway);
        other.load().await.unwrap();
        assert_eq!(other.records(), calls.records());
    }

    #[tokio::test]
    async fn test_edit_replaces_in_place() {
        let dir = tempdir().unwrap();
        let (_state, gateway) = local(&dir);
        let mut calls = TableController::<CallRecord>::new(gateway);
        calls.save(call("1"), None).await.unwrap();
        calls.save(call("2"), None).await.unwrap();

        calls.save(call("3"), Some(1)).await.unwrap();

        let ids: Vec<&str> = calls.records().iter().map(|c| c.user_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);

        let err = calls.save(call("4"), Some(7)).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn test_past_call_date_never_reaches_gateway() {
        let mut calls = TableController::<CallRecord>::new(Arc::new(Offline));
        let mut record = call("1");
        record.call_date = day(-1);

        let err = calls.save(record, None).await.unwrap_err();

        assert!(err.is_validation());
        assert!(calls.is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_restores_rows() {
        let mut calls = TableController::<CallRecord>::new(Arc::new(Offline));

        let err = calls.save(call("1"), None).await.unwrap_err();

        assert!(err.is_transport());
        assert!(calls.is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_rows() {
        let dir = tempdir().unwrap();
        let (_state, gateway) = local(&dir);
        let mut calls = TableController::<CallRecord>::new(gateway);
        calls.save(call("1"), None).await.unwrap();

        calls.gateway = Arc::new(Offline);
        assert!(calls.load().await.unwrap_err().is_transport());
        assert_eq!(calls.len(), 1);
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_tombstone() {
        let dir = tempdir().unwrap();
        let (state, gateway) = local(&dir);
        let mut calls = TableController::<CallRecord>::new(gateway);
        calls.save(call("1"), None).await.unwrap();
        calls.save(call("2"), None).await.unwrap();

        calls.soft_delete(0).await.unwrap();
        // out of range is a no-op
        calls.soft_delete(10).await.unwrap();

        assert!(calls.records()[0].deleted);
        let live: Vec<CallRecord> = state.list_table().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].user_id, "1");
        let all: Vec<CallRecord> = state.store().list_all().unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_delete() {
        let dir = tempdir().unwrap();
        let (state, gateway) = local(&dir);
        let mut uploads = TableController::<UploadRecord>::new(gateway);
        for operator in ["a", "b", "c"] {
            let record = UploadRecord {
                operator: operator.to_string(),
                ..Default::default()
            };
            uploads.save(record, None).await.unwrap();
        }

        let err = uploads.bulk_soft_delete(&[]).await.unwrap_err();
        assert_eq!(err.to_string(), SELECT_AT_LEAST_ONE);

        uploads.select(0);
        uploads.select(2);
        uploads.delete_selected().await.unwrap();

        assert!(uploads.selected().is_empty());
        let live: Vec<UploadRecord> = state.list_table().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].operator, "b");
        assert_eq!(live[0].current_date, day(0));
    }

    #[tokio::test]
    async fn test_progress_derives_on_save() {
        let dir = tempdir().unwrap();
        let (_state, gateway) = local(&dir);
        let mut rows = TableController::<ProgressRecord>::new(gateway);

        rows.save(progress("7", "არპასუხი"), None).await.unwrap();
        rows.save(progress("7", "სხვა"), None).await.unwrap();

        assert_eq!(rows.records()[0].repeat, "2024-01-11 09:00");
        assert_eq!(rows.records()[1].repeat, "2024-01-10 10:00");
        assert!(rows.records().iter().all(|r| r.count == 2));

        rows.soft_delete(0).await.unwrap();
        assert_eq!(rows.records()[1].count, 1);
    }

    #[tokio::test]
    async fn test_selection() {
        let dir = tempdir().unwrap();
        let (_state, gateway) = local(&dir);
        let mut calls = TableController::<CallRecord>::new(gateway);
        calls.save(call("1"), None).await.unwrap();

        calls.toggle(0);
        calls.select(5);
        assert!(calls.is_selected(0));
        assert_eq!(calls.selected().len(), 1);

        // A new row shifts the selection with its row
        calls.save(call("2"), None).await.unwrap();
        assert!(calls.is_selected(1));

        calls.toggle(1);
        assert!(calls.selected().is_empty());
        calls.select(0);
        calls.clear_selection();
        assert!(calls.selected().is_empty());
    }

    #[tokio::test]
    async fn test_export_and_import() {
        let dir = tempdir().unwrap();
        let (_state, gateway) = local(&dir);
        let mut calls = TableController::<CallRecord>::new(gateway.clone());
        calls.save(call("1"), None).await.unwrap();
        calls.save(call("2"), None).await.unwrap();

        assert!(calls.export_selected().unwrap_err().is_validation());

        calls.select(0);
        calls.select(1);
        let export = calls.export_selected().unwrap();
        assert_eq!(export.file_name, "selected_data.xlsx");

        let mut other = TableController::<CallRecord>::new(gateway);
        other.load().await.unwrap();
        let imported = other.import_xlsx(&export.bytes).await.unwrap();

        assert_eq!(imported, 2);
        let ids: Vec<&str> = other.records().iter().map(|c| c.user_id.as_str()).collect();
        // sheet rows were 2, 1; each one is prepended
        assert_eq!(ids, vec!["1", "2", "2", "1"]);
    }
}
