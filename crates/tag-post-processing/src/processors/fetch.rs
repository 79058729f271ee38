//! External resource lookups: `{ "url": ... }` becomes `{ "base64": ... }`.

use crate::fetch::FetchSpec;
use crate::processors::is_scratch;
use crate::{ProcessError, ProcessResult, TagServices, TagWarning, TagWorkItem};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tracing::debug;

const TAG: &str = "fetch";

pub(crate) async fn process(
    services: &TagServices,
    declaration: &mut Value,
    items: &[TagWorkItem],
) -> ProcessResult<Vec<TagWarning>> {
    if items.is_empty() || is_scratch(declaration) {
        return Ok(Vec::new());
    }

    for item in items {
        let Some(url) = item.data.get("url") else {
            continue;
        };
        let spec = FetchSpec::from_value(url).ok_or_else(|| {
            ProcessError::validation(&item.instance_path, TAG, "url must be a string or an object with a url")
        })?;

        let content = services.fetcher.fetch(&spec).await.map_err(|err| {
            ProcessError::validation(
                &item.instance_path,
                TAG,
                format!("unable to fetch {}: {}", spec.url, err),
            )
        })?;
        debug!(path = %item.instance_path, bytes = content.len(), "Fetched resource");

        if let Some(slot) = declaration.pointer_mut(&item.instance_path) {
            *slot = json!({ "base64": STANDARD.encode(&content) });
        }
    }
    Ok(Vec::new())
}
