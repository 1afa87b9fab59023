//! Persistence boundary for the client side.
//!
//! A [`Gateway`] moves whole tables as JSON rows: fetch the live rows, or
//! replace everything. [`HttpGateway`] talks to a running server;
//! [`LocalGateway`] calls an in-process [`AppState`] directly.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::api::AppState;
use crate::error::AppResult;
use crate::records::{CallRecord, ProgressRecord, Record, TableKind, UploadRecord};

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Non-deleted rows of a table, in stored order
    async fn fetch_table(&self, table: TableKind) -> AppResult<Vec<Value>>;

    /// Replace the whole table with `rows`, tombstones included
    async fn replace_table(&self, table: TableKind, rows: Vec<Value>) -> AppResult<()>;
}

/// Gateway over the REST API
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Websocket URL of the change channel
    pub fn ws_url(&self) -> String {
        let url = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/ws", url)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn fetch_table(&self, table: TableKind) -> AppResult<Vec<Value>> {
        let url = format!("{}{}", self.base_url, table.list_path());
        debug!("GET {}", url);

        let rows = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Value>>()
            .await?;
        Ok(rows)
    }

    async fn replace_table(&self, table: TableKind, rows: Vec<Value>) -> AppResult<()> {
        let url = format!("{}{}", self.base_url, table.save_path());
        debug!("POST {} ({} rows)", url, rows.len());

        self.client
            .post(&url)
            .json(&rows)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Gateway calling the server state in process
#[derive(Clone)]
pub struct LocalGateway {
    state: Arc<AppState>,
}

impl LocalGateway {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Gateway for LocalGateway {
    async fn fetch_table(&self, table: TableKind) -> AppResult<Vec<Value>> {
        match table {
            TableKind::Calls => fetch_local::<CallRecord>(&self.state),
            TableKind::Progress => fetch_local::<ProgressRecord>(&self.state),
            TableKind::Uploads => fetch_local::<UploadRecord>(&self.state),
        }
    }

    async fn replace_table(&self, table: TableKind, rows: Vec<Value>) -> AppResult<()> {
        match table {
            TableKind::Calls => replace_local::<CallRecord>(&self.state, rows),
            TableKind::Progress => replace_local::<ProgressRecord>(&self.state, rows),
            TableKind::Uploads => replace_local::<UploadRecord>(&self.state, rows),
        }
    }
}

fn fetch_local<R: Record>(state: &AppState) -> AppResult<Vec<Value>> {
    let rows = state.list_table::<R>()?;
    Ok(rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?)
}

fn replace_local<R: Record>(state: &AppState, rows: Vec<Value>) -> AppResult<()> {
    let rows = rows
        .into_iter()
        .map(serde_json::from_value::<R>)
        .collect::<Result<Vec<_>, _>>()?;
    state.replace_table(&rows)?;
    Ok(())
}
