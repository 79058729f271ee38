//! Tag annotation records and the work items derived from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tag annotation captured while the declaration was schema-validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    pub tag: String,
    /// JSON pointer to the tagged value.
    pub instance_path: String,
    /// Key within the parent object holding the value.
    #[serde(default)]
    pub parent_data_property: String,
    #[serde(default)]
    pub schema_data: Value,
}

impl TagRecord {
    pub fn new(tag: impl Into<String>, instance_path: impl Into<String>, schema_data: Value) -> Self {
        let instance_path = instance_path.into();
        let parent_data_property = last_segment(&instance_path).unwrap_or_default();
        Self {
            tag: tag.into(),
            instance_path,
            parent_data_property,
            schema_data,
        }
    }
}

/// One unit of post-processing, resolved against the current declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TagWorkItem {
    pub tag: String,
    pub instance_path: String,
    pub parent_data_property: String,
    pub schema_data: Value,
    /// Value at `instance_path`, `Null` when absent.
    pub data: Value,
    /// Value at the parent path, `Null` when absent.
    pub parent_data: Value,
    /// First path segment.
    pub tenant: String,
}

impl TagWorkItem {
    /// Resolve a record against `declaration`.
    pub fn resolve(record: &TagRecord, declaration: &Value) -> Self {
        let data = declaration
            .pointer(&record.instance_path)
            .cloned()
            .unwrap_or(Value::Null);
        let parent_data = declaration
            .pointer(parent_path(&record.instance_path))
            .cloned()
            .unwrap_or(Value::Null);
        let parent_data_property = if record.parent_data_property.is_empty() {
            last_segment(&record.instance_path).unwrap_or_default()
        } else {
            record.parent_data_property.clone()
        };

        Self {
            tag: record.tag.clone(),
            instance_path: record.instance_path.clone(),
            parent_data_property,
            schema_data: record.schema_data.clone(),
            data,
            parent_data,
            tenant: segments(&record.instance_path).into_iter().next().unwrap_or_default(),
        }
    }

    /// Segments of the instance path, unescaped.
    pub fn path_segments(&self) -> Vec<String> {
        segments(&self.instance_path)
    }
}

/// A non-fatal finding reported by a processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagWarning {
    pub tag: String,
    pub data_path: String,
    pub message: String,
}

impl TagWarning {
    pub fn new(tag: impl Into<String>, data_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            data_path: data_path.into(),
            message: message.into(),
        }
    }
}

/// Parent of a JSON pointer (`/a/b` -> `/a`, `/a` -> ``).
pub fn parent_path(pointer: &str) -> &str {
    match pointer.rfind('/') {
        Some(index) => &pointer[..index],
        None => "",
    }
}

/// Unescaped segments of a JSON pointer.
pub fn segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

fn last_segment(pointer: &str) -> Option<String> {
    segments(pointer).pop()
}

/// Replace the value at `pointer`. Returns false when the path does not exist.
pub fn set_pointer(declaration: &mut Value, pointer: &str, value: Value) -> bool {
    match declaration.pointer_mut(pointer) {
        Some(slot) => {
            *slot = value;
            true
        }
        None => false,
    }
}

/// Remove the value at `pointer` from its parent object or array.
pub fn remove_pointer(declaration: &mut Value, pointer: &str) -> Option<Value> {
    let key = last_segment(pointer)?;
    match declaration.pointer_mut(parent_path(pointer))? {
        Value::Object(map) => map.remove(&key),
        Value::Array(items) => {
            let index: usize = key.parse().ok()?;
            (index < items.len()).then(|| items.remove(index))
        }
        _ => None,
    }
}
