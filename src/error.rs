//! Error types for the subscription client.

use crate::types::{ClientState, EndpointUri};
use std::time::Duration;
use thiserror::Error;

/// Main error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("The service bus and subscription service cannot use the same endpoint: {uri}")]
    EndpointConflict { uri: EndpointUri },

    #[error("Timeout waiting for subscription service to respond (waited {0:?})")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid endpoint uri: {0}")]
    InvalidUri(String),

    #[error("Failed to resolve endpoint {uri}: {reason}")]
    Resolve { uri: EndpointUri, reason: String },

    #[error("Coordinator error: {0}")]
    Coordinator(String),

    #[error("Subscription client has been disposed")]
    Disposed,

    #[error("Invalid state for operation: {0:?}")]
    InvalidState(ClientState),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ClientError {
    /// Returns true if the error came from the bounded startup wait.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }

    /// Returns true if the error is a configuration problem that a retry
    /// cannot fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ClientError::EndpointConflict { .. }
                | ClientError::Configuration(_)
                | ClientError::InvalidUri(_)
        )
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
