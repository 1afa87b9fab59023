//! Client side of the change channel.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use super::Workspace;
use crate::error::{AppError, AppResult};
use crate::records::TableKind;
use crate::sync::{ClientMessage, ServerMessage, SyncProtocol};

/// A websocket subscription to table changes
pub struct SyncListener {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    connection_id: String,
}

impl SyncListener {
    /// Connect and wait for the server's welcome frame. Once this returns the
    /// server will deliver every later change.
    pub async fn connect(url: &str) -> AppResult<Self> {
        let (mut stream, _response) = connect_async(url).await?;

        while let Some(msg) = stream.next().await {
            if let WsMessage::Text(text) = msg? {
                if let Ok(ServerMessage::Welcome { connection_id, .. }) =
                    SyncProtocol::decode_server(&text)
                {
                    info!("Subscribed to changes at {} as {}", url, connection_id);
                    return Ok(Self {
                        stream,
                        connection_id,
                    });
                }
            }
        }

        Err(AppError::Transport(format!(
            "{} closed before sending a welcome",
            url
        )))
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Wait for the next table change. `None` once the server has closed
    /// the connection.
    pub async fn next_change(&mut self) -> AppResult<Option<TableKind>> {
        while let Some(msg) = self.stream.next().await {
            match msg? {
                WsMessage::Text(text) => match SyncProtocol::decode_server(&text) {
                    Ok(ServerMessage::DataUpdated { table }) => return Ok(Some(table)),
                    Ok(other) => debug!("Ignoring {:?}", other),
                    Err(e) => warn!("Ignoring malformed frame: {}", e),
                },
                WsMessage::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    pub async fn ping(&mut self, timestamp: i64) -> AppResult<()> {
        let text = SyncProtocol::encode_client(&ClientMessage::Ping { timestamp })?;
        self.stream.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    /// Say goodbye and close the socket
    pub async fn close(mut self) -> AppResult<()> {
        let text = SyncProtocol::encode_client(&ClientMessage::Goodbye { reason: None })?;
        self.stream.send(WsMessage::Text(text)).await?;
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Keep `workspace` in step with the server: reload every table on connect,
/// then reload each table the server reports as changed. Returns when the
/// server closes the connection.
pub async fn follow(url: String, workspace: Arc<Mutex<Workspace>>) -> anyhow::Result<()> {
    let mut listener = SyncListener::connect(&url).await?;

    if let Err(e) = workspace.lock().await.reload_all().await {
        warn!("Initial reload failed: {}", e);
    }

    while let Some(table) = listener.next_change().await? {
        debug!("{} changed, reloading", table);
        if let Err(e) = workspace.lock().await.reload(table).await {
            warn!("Failed to reload {}: {}", table, e);
        }
    }

    info!("Change channel {} closed", url);
    Ok(())
}
