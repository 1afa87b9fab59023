//! Application-level errors.
//!
//! Transport failures abort the operation and leave local state as it was.
//! Validation failures never reach the network. Malformed dates and times
//! are not errors at all: they are coerced to safe defaults where they are
//! parsed.

use thiserror::Error;

use crate::sheet::SheetError;
use crate::storage::StoreError;
use crate::sync::protocol::ProtocolError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Spreadsheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for application operations
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Transport(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::Validation("pick a row".to_string());
        assert_eq!(err.to_string(), "pick a row");
        assert!(err.is_validation());

        let err = AppError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "Transport error: connection refused");
        assert!(err.is_transport());
    }
}
