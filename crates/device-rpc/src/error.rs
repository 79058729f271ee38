//! Device RPC error types.

use thiserror::Error;

/// Device RPC error type.
#[derive(Error, Debug)]
pub enum RpcError {
    /// Device answered with a non-success status.
    #[error("{message}")]
    Status {
        /// HTTP status code returned by the device.
        status_code: u16,
        /// Message extracted from the device's response.
        message: String,
    },

    /// Request did not complete within its timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Transport-level HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (local files used as upload sources)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No active device connection in the control context.
    #[error("Device connection is not configured")]
    NotConnected,

    /// Device answered successfully but the reply was not usable.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl RpcError {
    /// HTTP-like status code, if the failure carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RpcError::Status { status_code, .. } => Some(*status_code),
            RpcError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Machine-readable classification, if any.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            RpcError::Timeout(_) => Some("ETIMEDOUT"),
            RpcError::NotConnected => Some("ENOTCONN"),
            _ => None,
        }
    }

    /// Whether the request timed out before the device answered.
    pub fn is_timeout(&self) -> bool {
        match self {
            RpcError::Timeout(_) => true,
            RpcError::Http(err) => err.is_timeout(),
            _ => false,
        }
    }
}

/// Result type alias using RpcError.
pub type RpcResult<T> = Result<T, RpcError>;
