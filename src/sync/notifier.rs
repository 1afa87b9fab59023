//! SyncNotifier: the live connection set and change broadcasts.
//!
//! The notifier keeps nothing but the currently open connections. A
//! broadcast goes to whoever is connected at that moment; a client that
//! connects later never sees it and is expected to reload on connect.

use dashmap::DashMap;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::protocol::{ServerMessage, PROTOCOL_VERSION};
use super::ConnectionId;
use crate::records::TableKind;

/// A single client connection
struct Connection {
    /// Channel to the connection's socket writer
    tx: mpsc::UnboundedSender<ServerMessage>,
    connected_at: Instant,
}

/// Broadcasts table changes to connected clients
pub struct SyncNotifier {
    connections: DashMap<ConnectionId, Connection>,
}

impl Default for SyncNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncNotifier {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection and queue its welcome frame.
    pub fn register(&self, tx: mpsc::UnboundedSender<ServerMessage>) -> ConnectionId {
        let connection_id = uuid::Uuid::new_v4().to_string();

        // Welcome goes out only once the connection can receive broadcasts
        let welcome = ServerMessage::Welcome {
            protocol_version: PROTOCOL_VERSION,
            connection_id: connection_id.clone(),
            server_time: chrono::Utc::now().timestamp(),
        };
        self.connections.insert(
            connection_id.clone(),
            Connection {
                tx: tx.clone(),
                connected_at: Instant::now(),
            },
        );
        let _ = tx.send(welcome);

        info!("Client connected: {}", connection_id);
        connection_id
    }

    /// Remove a connection
    pub fn unregister(&self, connection_id: &str) {
        if let Some((_, conn)) = self.connections.remove(connection_id) {
            info!(
                "Client disconnected: {} (after {:?})",
                connection_id,
                conn.connected_at.elapsed()
            );
        }
    }

    /// Tell every connected client that `table` changed. Returns the number
    /// of clients the notice was handed to; connections whose channel has
    /// closed are dropped.
    pub fn broadcast(&self, table: TableKind) -> usize {
        let msg = ServerMessage::DataUpdated { table };
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.connections.iter() {
            if entry.tx.send(msg.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(entry.key().clone());
            }
        }

        for connection_id in closed {
            self.unregister(&connection_id);
        }

        debug!("Broadcast {} change to {} clients", table, delivered);
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
