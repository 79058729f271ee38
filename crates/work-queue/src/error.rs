//! Work queue error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Another consume is already waiting on this queue.
    #[error("a consume is already outstanding on this queue")]
    ConsumeOutstanding,

    /// The waiting consumer was dropped before an item arrived.
    #[error("queue closed while waiting for an item")]
    Closed,
}

impl QueueError {
    pub fn status_code(&self) -> u16 {
        500
    }
}

/// Result type alias using QueueError.
pub type QueueResult<T> = Result<T, QueueError>;
