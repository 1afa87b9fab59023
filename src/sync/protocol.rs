//! JSON websocket protocol for change notifications.
//!
//! Every frame is a text frame holding one JSON object tagged by `event`:
//!
//! ```text
//! ← {"event":"welcome","protocolVersion":1,"connectionId":"…","serverTime":1700000000}
//! ← {"event":"data-updated","type":"progress"}
//! → {"event":"ping","timestamp":42}
//! ← {"event":"pong","timestamp":42,"serverTime":1700000000}
//! → {"event":"goodbye"}
//! ```

use serde::{Deserialize, Serialize};

use super::ConnectionId;
use crate::records::TableKind;

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum accepted frame size (64KB); frames carry no table data
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Protocol errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Message too large: {0} bytes (max: {1})")]
    MessageTooLarge(usize, usize),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Serialization(err.to_string())
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First frame on every connection
    #[serde(rename_all = "camelCase")]
    Welcome {
        protocol_version: u8,
        connection_id: ConnectionId,
        server_time: i64,
    },

    /// A table was replaced; clients showing it should reload it
    DataUpdated {
        #[serde(rename = "type")]
        table: TableKind,
    },

    #[serde(rename_all = "camelCase")]
    Pong { timestamp: i64, server_time: i64 },
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientMessage {
    Ping {
        #[serde(default)]
        timestamp: i64,
    },

    /// Graceful disconnect
    Goodbye {
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Protocol encoder/decoder
pub struct SyncProtocol;

impl SyncProtocol {
    pub fn encode_server(msg: &ServerMessage) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(msg)?)
    }

    pub fn decode_server(text: &str) -> Result<ServerMessage, ProtocolError> {
        Self::check_size(text)?;
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode_client(msg: &ClientMessage) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(msg)?)
    }

    pub fn decode_client(text: &str) -> Result<ClientMessage, ProtocolError> {
        Self::check_size(text)?;
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidFormat(e.to_string()))
    }

    fn check_size(text: &str) -> Result<(), ProtocolError> {
        if text.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge(text.len(), MAX_MESSAGE_SIZE));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_updated_wire_format() {
        let msg = ServerMessage::DataUpdated {
            table: TableKind::Progress,
        };
        let text = SyncProtocol::encode_server(&msg).unwrap();
        assert_eq!(text, r#"{"event":"data-updated","type":"progress"}"#);

        assert_eq!(SyncProtocol::decode_server(&text).unwrap(), msg);
    }

    #[test]
    fn test_welcome_fields_are_camel_case() {
        let msg = ServerMessage::Welcome {
            protocol_version: PROTOCOL_VERSION,
            connection_id: "abc".to_string(),
            server_time: 5,
        };
        let value: serde_json::Value =
            serde_json::from_str(&SyncProtocol::encode_server(&msg).unwrap()).unwrap();

        assert_eq!(value["event"], "welcome");
        assert_eq!(value["connectionId"], "abc");
        assert_eq!(value["protocolVersion"], 1);
    }

    #[test]
    fn test_decode_client_messages() {
        assert_eq!(
            SyncProtocol::decode_client(r#"{"event":"ping","timestamp":7}"#).unwrap(),
            ClientMessage::Ping { timestamp: 7 }
        );
        assert_eq!(
            SyncProtocol::decode_client(r#"{"event":"goodbye"}"#).unwrap(),
            ClientMessage::Goodbye { reason: None }
        );
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result = SyncProtocol::decode_client(r#"{"event":"dance"}"#);
        assert!(matches!(result, Err(ProtocolError::InvalidFormat(_))));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let text = " ".repeat(MAX_MESSAGE_SIZE + 1);
        let result = SyncProtocol::decode_client(&text);
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge(_, _))));
    }
}
