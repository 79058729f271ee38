//! Core configuration and utilities for the declaration orchestrator.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Settings, SettingsStore, DEFAULT_LOG_LEVEL};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
