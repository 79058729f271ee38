//! Per-sub-declaration work items.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One sub-declaration being processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub protocol: String,
    /// URL prefix for this task's device connection; empty means host/port.
    pub url_prefix: String,
    pub dry_run: bool,
    /// Resolved metadata keyed by declaration instance path.
    pub metadata: Map<String, Value>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            protocol: "https".to_string(),
            url_prefix: String::new(),
            dry_run: false,
            metadata: Map::new(),
        }
    }
}

impl Task {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata recorded for an instance path.
    pub fn metadata_for(&self, instance_path: &str) -> Option<&Value> {
        self.metadata.get(instance_path)
    }

    /// Merge `key: value` into the metadata object of an instance path.
    pub fn record_metadata(&mut self, instance_path: &str, key: &str, value: Value) {
        let entry = self
            .metadata
            .entry(instance_path.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(map) = entry {
            map.insert(key.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_metadata_merges_keys() {
        let mut task = Task::new();
        task.record_metadata("/T/A/vs/virtualAddresses/0", "mask", json!("255.255.255.0"));
        task.record_metadata("/T/A/vs/virtualAddresses/0", "fullPath", json!("/Common/va"));

        assert_eq!(
            task.metadata_for("/T/A/vs/virtualAddresses/0"),
            Some(&json!({"mask": "255.255.255.0", "fullPath": "/Common/va"}))
        );
    }
}
