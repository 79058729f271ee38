//! Apply pipeline errors.

use device_mutex::MutexError;
use device_rpc::RpcError;
use device_update_engine::UpdateError;
use request_context::ContextError;
use tag_post_processing::ProcessError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Target discovery failed: {0}")]
    Discovery(#[source] RpcError),

    #[error(transparent)]
    Lock(#[from] MutexError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl ApplyError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApplyError::Discovery(err) => err.status_code().unwrap_or(500),
            ApplyError::Lock(err) => err.status_code(),
            ApplyError::Process(err) => err.status_code(),
            ApplyError::Update(err) => err.status_code(),
            ApplyError::Context(_) => 500,
        }
    }
}

pub type ApplyResult<T> = Result<T, ApplyError>;
