use device_rpc::RpcError;
use request_context::ContextError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    /// The script ran but reported failure.
    #[error("{0}")]
    ScriptFailure(String),

    /// The script task ended in `FAILED` or `CANCELED`.
    #[error("{0}")]
    TaskFailed(String),

    /// The device no longer knows the script task.
    #[error("{0}")]
    TaskLost(String),

    /// The script task did not finish within the poll budget.
    #[error("{0}")]
    TaskTimeout(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl UpdateError {
    /// Status code for the caller; 500 unless a step assigned one.
    pub fn status_code(&self) -> u16 {
        match self {
            UpdateError::ScriptFailure(_) => 422,
            UpdateError::Rpc(err) => err.status_code().unwrap_or(500),
            _ => 500,
        }
    }
}

pub type UpdateResult<T> = Result<T, UpdateError>;
