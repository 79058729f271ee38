//! Bundle files: a validated declaration plus everything needed to apply it.

use anyhow::Context as _;
use device_update_engine::UpdatePayload;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tag_post_processing::{ProcessOptions, TagRecord};

/// One unit of work for the apply pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub declaration: Value,
    /// Declaration as submitted, before defaults were filled in. Defaults to `declaration`.
    #[serde(default)]
    pub original: Option<Value>,
    #[serde(default)]
    pub tag_records: Vec<TagRecord>,
    #[serde(default)]
    pub options: ProcessOptions,
    pub update: UpdatePayload,
    #[serde(default)]
    pub diff: Value,
    #[serde(default)]
    pub dry_run: bool,
}

impl Bundle {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read bundle {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse bundle {}", path.display()))
    }
}
