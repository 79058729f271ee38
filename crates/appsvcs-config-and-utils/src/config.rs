//! Service-wide settings.
//!
//! Settings are loaded once at process start into a [`SettingsStore`], which is
//! cloned into every request context. Operations that depend on settings take a
//! [`SettingsStore::snapshot`] when they start, so a refresh never changes the
//! values seen half-way through an update.

use crate::{CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Service-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Run pre-script file uploads one at a time instead of in parallel.
    #[serde(default)]
    pub serialize_file_uploads: bool,
    /// Whether declarations may use Service Discovery features.
    #[serde(default = "default_service_discovery_enabled")]
    pub service_discovery_enabled: bool,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_service_discovery_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            serialize_file_uploads: false,
            service_discovery_enabled: default_service_discovery_enabled(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings from the settings file, falling back to defaults, then
    /// apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let settings_path = paths.settings_file();

        let mut settings = if settings_path.exists() {
            Self::load_from_file(&settings_path)?
        } else {
            Self::default()
        };

        settings.load_from_env();
        Ok(settings)
    }

    /// Load settings from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to the settings file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.settings_file(), content)?;
        Ok(())
    }

    /// Whether the configured log level is `debug` (or more verbose).
    pub fn is_debug(&self) -> bool {
        matches!(self.log_level.to_ascii_lowercase().as_str(), "debug" | "trace")
    }

    fn load_from_env(&mut self) {
        if let Ok(level) = std::env::var("APPSVCS_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(value) = env_flag("APPSVCS_SERIALIZE_FILE_UPLOADS") {
            self.serialize_file_uploads = value;
        }
        if let Some(value) = env_flag("APPSVCS_SERVICE_DISCOVERY_ENABLED") {
            self.service_discovery_enabled = value;
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(variable = name, value = other, "Ignoring unparseable boolean override");
            None
        }
    }
}

/// Shared, refreshable holder for [`Settings`].
///
/// Cloning the store is cheap and every clone observes the same settings.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    inner: Arc<RwLock<Settings>>,
}

impl SettingsStore {
    /// Create a store holding the given settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Fresh copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current settings.
    pub fn replace(&self, settings: Settings) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Reload settings from disk and environment.
    pub fn refresh(&self, paths: &Paths) -> CoreResult<Settings> {
        let settings = Settings::load(paths)?;
        self.replace(settings.clone());
        tracing::debug!(?settings, "Settings refreshed");
        Ok(settings)
    }
}
