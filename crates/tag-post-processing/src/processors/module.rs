//! Module provisioning gate.

use crate::processors::is_scratch;
use crate::{ProcessError, ProcessResult, TagWarning, TagWorkItem};
use request_context::Context;
use serde_json::Value;

const TAG: &str = "modules";

pub(crate) fn process(
    ctx: &Context,
    declaration: &Value,
    items: &[TagWorkItem],
) -> ProcessResult<Vec<TagWarning>> {
    if items.is_empty() || ctx.target.is_big_iq() || is_scratch(declaration) {
        return Ok(Vec::new());
    }

    for item in items {
        let modules = required_modules(item)?;
        if modules.is_empty() || modules.iter().any(|module| ctx.target.is_provisioned(module)) {
            continue;
        }
        return Err(ProcessError::validation(
            &item.instance_path,
            TAG,
            format!(
                "{} requires one of the following modules to be provisioned: {}",
                item.instance_path,
                modules.join(", ")
            ),
        ));
    }
    Ok(Vec::new())
}

fn required_modules(item: &TagWorkItem) -> ProcessResult<Vec<String>> {
    match &item.schema_data {
        Value::String(module) => Ok(vec![module.clone()]),
        Value::Array(modules) => modules
            .iter()
            .map(|module| {
                module.as_str().map(str::to_string).ok_or_else(|| {
                    ProcessError::invalid_config(TAG, &item.instance_path, "module names must be strings")
                })
            })
            .collect(),
        _ => Err(ProcessError::invalid_config(
            TAG,
            &item.instance_path,
            "expected a module name or a list of module names",
        )),
    }
}
