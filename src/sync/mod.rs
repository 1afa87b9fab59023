//! Change notification over websockets.
//!
//! This module provides:
//! - the JSON frame protocol spoken on `/ws`
//! - the live connection set and table-change broadcasts
//!
//! Delivery is at-most-once and best-effort: nothing is queued for clients
//! that are not connected, and nothing is acknowledged.

pub mod notifier;
pub mod protocol;

pub use notifier::SyncNotifier;
pub use protocol::{ClientMessage, ServerMessage, SyncProtocol, PROTOCOL_VERSION};

/// Unique identifier for a websocket connection
pub type ConnectionId = String;
