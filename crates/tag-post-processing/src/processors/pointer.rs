//! Declaration pointers (`use` references).
//!
//! A reference is absolute (`/Tenant/App/item`), app-relative (`App/item`) or
//! item-relative (`item`). References are rewritten to absolute form after the
//! target is found in the declaration and its class checked.

use crate::processors::is_scratch;
use crate::{ProcessError, ProcessResult, TagWarning, TagWorkItem};
use serde_json::Value;

const TAG: &str = "pointer";

pub(crate) fn process(
    declaration: &mut Value,
    original: &Value,
    items: &[TagWorkItem],
) -> ProcessResult<Vec<TagWarning>> {
    if items.is_empty() || is_scratch(declaration) {
        return Ok(Vec::new());
    }

    for item in items {
        let (reference, in_object) = match &item.data {
            Value::String(reference) => (reference.clone(), false),
            Value::Object(map) => match map.get("use").and_then(Value::as_str) {
                Some(reference) => (reference.to_string(), true),
                None => continue,
            },
            _ => continue,
        };

        let segments = item.path_segments();
        let tenant = segments.first().map(String::as_str).unwrap_or_default();
        let app = segments.get(1).map(String::as_str).unwrap_or_default();
        let absolute = absolute_path(&reference, tenant, app);

        let Some(target) = lookup(original, &absolute).or_else(|| lookup(declaration, &absolute)) else {
            return Err(ProcessError::validation(
                &item.instance_path,
                TAG,
                format!("{} contains path to non-existent object {}", item.instance_path, absolute),
            ));
        };

        let classes = allowed_classes(item)?;
        let class = target.get("class").and_then(Value::as_str).unwrap_or_default();
        if !classes.is_empty() && !classes.iter().any(|allowed| allowed == class) {
            return Err(ProcessError::validation(
                &item.instance_path,
                TAG,
                format!(
                    "{} contains path to object of wrong type {} (expected {})",
                    item.instance_path,
                    absolute,
                    classes.join(" or ")
                ),
            ));
        }

        let pointer = if in_object {
            format!("{}/use", item.instance_path)
        } else {
            item.instance_path.clone()
        };
        if let Some(slot) = declaration.pointer_mut(&pointer) {
            *slot = Value::String(absolute);
        }
    }
    Ok(Vec::new())
}

pub(crate) fn absolute_path(reference: &str, tenant: &str, app: &str) -> String {
    if reference.starts_with('/') {
        return reference.to_string();
    }
    match reference.matches('/').count() {
        0 => format!("/{tenant}/{app}/{reference}"),
        _ => format!("/{tenant}/{reference}"),
    }
}

fn lookup<'a>(declaration: &'a Value, absolute: &str) -> Option<&'a Value> {
    let pointer: String = absolute
        .split('/')
        .skip(1)
        .map(|segment| format!("/{}", segment.replace('~', "~0")))
        .collect();
    declaration.pointer(&pointer).filter(|value| value.is_object())
}

fn allowed_classes(item: &TagWorkItem) -> ProcessResult<Vec<String>> {
    match &item.schema_data {
        Value::Null => Ok(Vec::new()),
        Value::String(class) => Ok(vec![class.clone()]),
        Value::Array(classes) => Ok(classes
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()),
        _ => Err(ProcessError::invalid_config(
            TAG,
            &item.instance_path,
            "expected a class name or list of class names",
        )),
    }
}
