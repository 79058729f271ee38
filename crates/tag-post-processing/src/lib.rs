//! Post-processing of schema-validated declarations.
//!
//! Schema validation records a [`TagRecord`] for every value marked for
//! special handling. [`process`] resolves those records against the
//! declaration and runs the matching [`TagProcessor`]s, which resolve,
//! validate and rewrite the tagged values against the live target device.

mod dispatcher;
mod error;
pub mod fetch;
mod first_success;
mod processors;
mod record;
mod services;
pub mod vault;

#[cfg(test)]
mod tests;

pub use dispatcher::{process, ProcessOptions, ProcessOutcome};
pub use error::{ProcessError, ProcessResult, ValidationFailure};
pub use first_success::first_success;
pub use processors::{TagProcessor, ENC_DEVICE, ENC_REMOTE, LONG_SECRET_REMOTE_LIMIT};
pub use record::{TagRecord, TagWarning, TagWorkItem};
pub use services::{ResourceFetcher, SecretVault, TagServices};
