//! Minimum device version gate.
//!
//! Schema metadata is a version string or `{ "version": ..., "strict": bool }`.
//! Strict gates reject the declaration; others drop the property and warn.

use crate::record::{remove_pointer, segments};
use crate::{ProcessError, ProcessResult, TagWarning, TagWorkItem};
use request_context::{version_less_than, Context};
use serde_json::Value;
use tracing::info;

const TAG: &str = "minVersion";

pub(crate) fn process(
    ctx: &Context,
    declaration: &mut Value,
    items: &[TagWorkItem],
) -> ProcessResult<Vec<TagWarning>> {
    let mut warnings = Vec::new();
    let mut removals = Vec::new();
    let device_version = ctx.target.tmos_version.as_str();

    for item in items {
        let (min_version, strict) = gate(item)?;
        if item.data.is_null() || !version_less_than(device_version, &min_version) {
            continue;
        }

        let message = format!(
            "{} requires version {} or later (target is {})",
            item.instance_path, min_version, device_version
        );
        if strict {
            return Err(ProcessError::validation(&item.instance_path, TAG, message));
        }

        info!(path = %item.instance_path, min_version = %min_version, "Removing property unsupported by target version");
        removals.push(item.instance_path.as_str());
        warnings.push(TagWarning::new(TAG, &item.instance_path, format!("{message}; property removed")));
    }

    // Highest array index first.
    removals.sort_by_cached_key(|pointer| removal_key(pointer));
    for pointer in removals.into_iter().rev() {
        remove_pointer(declaration, pointer);
    }
    Ok(warnings)
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Index(usize),
    Key(String),
}

fn removal_key(pointer: &str) -> Vec<Segment> {
    segments(pointer)
        .into_iter()
        .map(|segment| match segment.parse() {
            Ok(index) => Segment::Index(index),
            Err(_) => Segment::Key(segment),
        })
        .collect()
}

fn gate(item: &TagWorkItem) -> ProcessResult<(String, bool)> {
    match &item.schema_data {
        Value::String(version) => Ok((version.clone(), false)),
        Value::Object(schema) => {
            let version = schema.get("version").and_then(Value::as_str).ok_or_else(|| {
                ProcessError::invalid_config(TAG, &item.instance_path, "version is required")
            })?;
            let strict = schema.get("strict").and_then(Value::as_bool).unwrap_or(false);
            Ok((version.to_string(), strict))
        }
        _ => Err(ProcessError::invalid_config(
            TAG,
            &item.instance_path,
            "expected a version string or object",
        )),
    }
}
