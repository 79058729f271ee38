//! Error types for tag post-processing.

use device_rpc::RpcError;
use request_context::ContextError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A declaration value that failed a tag check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    /// Instance path of the offending value.
    pub data_path: String,
    /// Tag that rejected the value.
    pub keyword: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(
        data_path: impl Into<String>,
        keyword: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            data_path: data_path.into(),
            keyword: keyword.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Errors that abort post-processing.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The declaration is invalid for the target.
    #[error("{0}")]
    Validation(ValidationFailure),

    /// A device call failed.
    #[error(transparent)]
    Transport(#[from] RpcError),

    /// Schema metadata attached to a tag has the wrong shape.
    #[error("invalid {tag} tag configuration at {data_path}: {message}")]
    InvalidTagConfig {
        tag: String,
        data_path: String,
        message: String,
    },

    #[error("declaration must be a JSON object")]
    InvalidDeclaration,

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl ProcessError {
    pub fn validation(
        data_path: impl Into<String>,
        keyword: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ProcessError::Validation(ValidationFailure::new(data_path, keyword, message))
    }

    pub fn invalid_config(
        tag: impl Into<String>,
        data_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ProcessError::InvalidTagConfig {
            tag: tag.into(),
            data_path: data_path.into(),
            message: message.into(),
        }
    }

    /// Status code for the caller-visible response.
    pub fn status_code(&self) -> u16 {
        match self {
            ProcessError::Validation(_) => 422,
            ProcessError::Transport(err) => err.status_code().unwrap_or(500),
            ProcessError::InvalidDeclaration => 400,
            ProcessError::InvalidTagConfig { .. } | ProcessError::Context(_) => 500,
        }
    }

    /// The validation failure, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationFailure> {
        match self {
            ProcessError::Validation(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Result type for tag post-processing.
pub type ProcessResult<T> = Result<T, ProcessError>;
