//! Lock lifecycle state machine.
//!
//! ```text
//! Unlocked --Acquire--> Acquiring --Acquired--> Held --Release--> Releasing --Released--> Unlocked
//!                           |  \                  ^
//!                           |   Expired           |
//!                           |     v               |
//!                           |  ExpiredRecovery --Acquired
//!                           |     |
//!                   Rejected|     RecoveryFailed
//!                           v     v
//!                          Unlocked
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub lock_machine(Unlocked)

    Unlocked => {
        Acquire => Acquiring
    },
    Acquiring => {
        Acquired => Held,
        // A live lock exists or the create failed.
        Rejected => Unlocked,
        // The existing lock is past its window.
        Expired => ExpiredRecovery
    },
    ExpiredRecovery => {
        Acquired => Held,
        RecoveryFailed => Unlocked
    },
    Held => {
        Release => Releasing
    },
    Releasing => {
        Released => Unlocked
    }
}

pub use lock_machine::Input as LockMachineInput;
pub use lock_machine::State as LockMachineState;
pub use lock_machine::StateMachine as LockMachine;

/// Lock state for logs and callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Unlocked,
    Acquiring,
    Held,
    Releasing,
    ExpiredRecovery,
}

impl From<&LockMachineState> for LockState {
    fn from(state: &LockMachineState) -> Self {
        match state {
            LockMachineState::Unlocked => LockState::Unlocked,
            LockMachineState::Acquiring => LockState::Acquiring,
            LockMachineState::Held => LockState::Held,
            LockMachineState::Releasing => LockState::Releasing,
            LockMachineState::ExpiredRecovery => LockState::ExpiredRecovery,
        }
    }
}
