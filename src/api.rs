//! HTTP and websocket surface of the server.
//!
//! Every table gets a GET route returning its live rows and a POST route
//! replacing the whole table. A successful replace is broadcast to every
//! websocket client on `/ws` before the response is sent.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::records::{CallRecord, ProgressRecord, Record, UploadRecord};
use crate::storage::{TableMetadata, TableStore};
use crate::sync::{
    protocol::MAX_MESSAGE_SIZE, ClientMessage, ServerMessage, SyncNotifier, SyncProtocol,
    PROTOCOL_VERSION,
};

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// Shared application state
pub struct AppState {
    store: TableStore,
    notifier: Arc<SyncNotifier>,
    started_at: Instant,
}

impl AppState {
    pub fn new(store: TableStore) -> Self {
        Self {
            store,
            notifier: Arc::new(SyncNotifier::new()),
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<SyncNotifier> {
        &self.notifier
    }

    /// Live rows of a table, in stored order
    pub fn list_table<R: Record>(&self) -> AppResult<Vec<R>> {
        Ok(self.store.list_active()?)
    }

    /// Replace a table and broadcast the change. The broadcast happens under
    /// the table's write lock, so clients see notices in commit order.
    pub fn replace_table<R: Record>(&self, rows: &[R]) -> AppResult<TableMetadata> {
        let meta = self.store.replace_all_with(rows, |_| {
            self.notifier.broadcast(R::KIND);
        })?;

        info!(
            "Saved {} table: {} rows, {} deleted",
            R::KIND,
            meta.row_count,
            meta.tombstone_count
        );
        Ok(meta)
    }
}

// ============================================================================
// API TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    protocol_version: u8,
    uptime_seconds: u64,
    connected_clients: usize,
    storage_bytes: u64,
    tables: Vec<TableHealth>,
}

#[derive(Debug, Serialize)]
struct TableHealth {
    table: String,
    rows: u64,
    deleted: u64,
    updated_at: i64,
}

/// Error returned by handlers: 500 with the error text
struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

async fn health_check(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let stats = state.store.stats().map_err(AppError::from)?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        protocol_version: PROTOCOL_VERSION,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        connected_clients: state.notifier.connection_count(),
        storage_bytes: stats.total_size_bytes,
        tables: stats
            .tables
            .into_iter()
            .map(|meta| TableHealth {
                rows: meta.live_count(),
                deleted: meta.tombstone_count,
                updated_at: meta.updated_at,
                table: meta.table,
            })
            .collect(),
    }))
}

async fn list_rows<R: Record>(State(state): State<Arc<AppState>>) -> Result<Json<Vec<R>>, ApiError> {
    Ok(Json(state.list_table::<R>()?))
}

async fn replace_rows<R: Record>(
    State(state): State<Arc<AppState>>,
    Json(rows): Json<Vec<R>>,
) -> Result<(StatusCode, &'static str), ApiError> {
    state.replace_table(&rows)?;
    Ok((StatusCode::OK, "OK"))
}

fn table_routes<R: Record>(router: Router<Arc<AppState>>) -> Router<Arc<AppState>> {
    router
        .route(R::KIND.list_path(), get(list_rows::<R>))
        .route(R::KIND.save_path(), axum::routing::post(replace_rows::<R>))
}

/// Build the application router
pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(ws_handler));
    app = table_routes::<CallRecord>(app);
    app = table_routes::<ProgressRecord>(app);
    app = table_routes::<UploadRecord>(app);

    if let Some(dir) = &config.static_dir {
        info!("Serving static files from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

// ============================================================================
// WEBSOCKET HANDLER
// ============================================================================

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connection_id = state.notifier.register(tx.clone());
    let send_id = connection_id.clone();
    let recv_id = connection_id.clone();

    // Forward queued frames to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match SyncProtocol::encode_server(&msg) {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to encode message: {}", e),
            }
        }
        debug!("Send task ended for {}", send_id);
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => match SyncProtocol::decode_client(&text) {
                    Ok(ClientMessage::Ping { timestamp }) => {
                        let _ = tx.send(ServerMessage::Pong {
                            timestamp,
                            server_time: chrono::Utc::now().timestamp(),
                        });
                    }
                    Ok(ClientMessage::Goodbye { reason }) => {
                        debug!("Goodbye from {}: {:?}", recv_id, reason);
                        break;
                    }
                    Err(e) => warn!("Ignoring frame from {}: {}", recv_id, e),
                },
                Message::Close(_) => break,
                // Ping/pong frames are answered by the socket itself
                _ => {}
            }
        }
        debug!("Receive task ended for {}", recv_id);
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.notifier.unregister(&connection_id);
}
