//! File system paths used by the orchestrator.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Settings filename under the base directory.
const SETTINGS_FILE_NAME: &str = "settings.json";
/// Directory holding per-request trace files.
const TRACE_DIR_NAME: &str = "trace";

/// Manages file system paths for the orchestrator.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.appsvcs)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.appsvcs`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".appsvcs"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.appsvcs).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the settings file path (~/.appsvcs/settings.json).
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join(SETTINGS_FILE_NAME)
    }

    /// Get the trace file path for a target host (~/.appsvcs/trace/<host>.cli).
    pub fn trace_file(&self, host: &str) -> PathBuf {
        let sanitized: String = host
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.base_dir.join(TRACE_DIR_NAME).join(format!("{sanitized}.cli"))
    }

    /// Ensure the base and trace directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(self.base_dir.join(TRACE_DIR_NAME))?;
        Ok(())
    }
}
