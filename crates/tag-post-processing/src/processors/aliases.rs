//! Property aliases: `{ "alias": "canonical" }` in the schema metadata moves
//! an aliased property to its canonical name unless the canonical one is set.

use crate::processors::is_scratch;
use crate::{ProcessError, ProcessResult, TagWarning, TagWorkItem};
use serde_json::Value;

const TAG: &str = "aliases";

pub(crate) fn process(declaration: &mut Value, items: &[TagWorkItem]) -> ProcessResult<Vec<TagWarning>> {
    if items.is_empty() || is_scratch(declaration) {
        return Ok(Vec::new());
    }

    for item in items {
        let Value::Object(aliases) = &item.schema_data else {
            return Err(ProcessError::invalid_config(
                TAG,
                &item.instance_path,
                "expected an object of alias names",
            ));
        };
        let Some(Value::Object(target)) = declaration.pointer_mut(&item.instance_path) else {
            continue;
        };

        for (alias, canonical) in aliases {
            let canonical = canonical.as_str().ok_or_else(|| {
                ProcessError::invalid_config(TAG, &item.instance_path, format!("alias {alias} must name a property"))
            })?;
            if let Some(value) = target.remove(alias) {
                target.entry(canonical.to_string()).or_insert(value);
            }
        }
    }
    Ok(Vec::new())
}
