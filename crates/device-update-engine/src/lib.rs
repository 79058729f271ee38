//! Device update protocol.
//!
//! [`UpdateEngine::submit`] takes a rendered configuration script and drives
//! it onto the device: whitelist patch, pre-script calls, upload, merge, run,
//! verify and overwrite. Script failures are carried as data until the end so
//! verification and the overwrite of the uploaded script always happen.

mod config;
mod engine;
mod error;
mod payload;
mod run_script;
mod whitelist;

#[cfg(test)]
mod tests;

pub use config::RunScriptConfig;
pub use engine::{
    UpdateEngine, CONFIG_PATH, SENTINEL_PATH, UPDATE_FILE_NAME, UPDATE_FILE_PATH,
};
pub use error::{UpdateError, UpdateResult};
pub use payload::{UpdateOutcome, UpdatePayload};
pub use run_script::{run_script, SCRIPT_NAME, SCRIPT_TASK_PATH};
pub use whitelist::{ensure_whitelisted, parse_whitelist, WHITELIST_PATH};
