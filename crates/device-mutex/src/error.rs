use thiserror::Error;

/// Classification code of lock failures.
pub const MUTEX_FAILURE: &str = "mutex_failure";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutexError {
    /// The lock could not be taken; retry the whole operation later.
    #[error("{0}")]
    Failure(String),

    #[error("Invalid lock state transition: {0}")]
    InvalidTransition(String),
}

impl MutexError {
    pub fn status_code(&self) -> u16 {
        match self {
            MutexError::Failure(_) => 503,
            MutexError::InvalidTransition(_) => 500,
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            MutexError::Failure(_) => Some(MUTEX_FAILURE),
            MutexError::InvalidTransition(_) => None,
        }
    }
}

pub type MutexResult<T> = Result<T, MutexError>;
