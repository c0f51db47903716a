//! Error types

use crate::state::ConnectionState;

/// Failure reported by a Session Client call.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The client rejected the call
    #[error("{0}")]
    Rejected(String),
    /// No answer within the request timeout
    #[error("Session client did not answer within {0:?}")]
    Timeout(std::time::Duration),
    /// The client is gone (destroyed, exited, channel closed)
    #[error("Session client closed: {0}")]
    Closed(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed message from the client
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Gateway operation failure, reported as a structured result.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Operation attempted while disconnected or not initialized
    #[error("WhatsApp client not ready. Status: {state}")]
    NotReady { state: ConnectionState },
    /// Missing or empty required fields
    #[error("{0}")]
    InvalidInput(String),
    /// The Session Client rejected the call
    #[error("{0}")]
    UpstreamFailure(String),
    /// The gateway did not respond
    #[error("Gateway unreachable: {0}")]
    Unreachable(String),
}

impl From<SessionError> for GatewayError {
    fn from(e: SessionError) -> Self {
        GatewayError::UpstreamFailure(e.to_string())
    }
}

/// Gateway result type
pub type Result<T> = std::result::Result<T, GatewayError>;
