//! Service Discovery prerequisites.

use crate::processors::is_scratch;
use crate::{ProcessError, ProcessResult, TagWarning, TagWorkItem};
use request_context::Context;
use serde_json::Value;

const TAG: &str = "serviceDiscovery";

pub(crate) fn process(
    ctx: &Context,
    declaration: &Value,
    items: &[TagWorkItem],
) -> ProcessResult<Vec<TagWarning>> {
    if items.is_empty() || is_scratch(declaration) {
        return Ok(Vec::new());
    }

    // One snapshot for the whole batch.
    let settings = ctx.settings.snapshot();

    for item in items {
        let exceptions = exceptions(item)?;
        if exceptions.contains(&item.data) {
            continue;
        }

        if !settings.service_discovery_enabled {
            return Err(ProcessError::validation(
                &item.instance_path,
                TAG,
                format!("{}: requires Service Discovery to be enabled", item.instance_path),
            ));
        }

        if ctx.host.service_discovery_installed == Some(false) && ctx.target.is_local() {
            return Err(ProcessError::validation(
                &item.instance_path,
                TAG,
                format!(
                    "{}: requires Service Discovery to be installed. Service Discovery will be installed the next time the service restarts",
                    item.instance_path
                ),
            ));
        }
    }
    Ok(Vec::new())
}

fn exceptions(item: &TagWorkItem) -> ProcessResult<Vec<Value>> {
    let schema = match &item.schema_data {
        Value::Null => return Ok(Vec::new()),
        Value::Object(schema) => schema,
        _ => {
            return Err(ProcessError::invalid_config(
                TAG,
                &item.instance_path,
                "expected an object",
            ))
        }
    };

    if let Some(key) = schema.keys().find(|key| key.as_str() != "exceptions") {
        return Err(ProcessError::invalid_config(
            TAG,
            &item.instance_path,
            format!("unknown property {key}"),
        ));
    }

    match schema.get("exceptions") {
        None => Ok(Vec::new()),
        Some(Value::Array(values)) => Ok(values.clone()),
        Some(_) => Err(ProcessError::invalid_config(
            TAG,
            &item.instance_path,
            "exceptions must be an array",
        )),
    }
}
