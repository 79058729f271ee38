//! Device-side configuration lock.
//!
//! Configuration changes against one device are serialized through a single
//! internal data-group record on the device. [`MutexCoordinator::acquire`]
//! creates the record (recovering it when a previous holder left it behind
//! past its expiry window) and starts a [`LockRefresher`] that keeps it fresh;
//! [`MutexCoordinator::release`] stops the refresher and deletes the record.

mod config;
mod coordinator;
mod error;
mod lock_fsm;
mod refresher;

#[cfg(test)]
mod tests;

pub use config::MutexConfig;
pub use coordinator::{
    LockHandle, MutexCoordinator, LOCK_COLLECTION_PATH, LOCK_NAME, LOCK_PATH, SCRIPTS_STOP_NAME,
    SCRIPTS_STOP_PATH,
};
pub use error::{MutexError, MutexResult, MUTEX_FAILURE};
pub use lock_fsm::{LockMachine, LockMachineInput, LockMachineState, LockState};
pub use refresher::LockRefresher;
