//! Dispatching tag records to processors.

use crate::{ProcessError, ProcessResult, TagProcessor, TagRecord, TagServices, TagWarning, TagWorkItem};
use request_context::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Which tags a dispatch call runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOptions {
    /// Run only these tags. Takes precedence over `exclude_list`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_list: Option<Vec<String>>,
    /// Skip these tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_list: Option<Vec<String>>,
}

impl ProcessOptions {
    fn allows(&self, tag: &str) -> bool {
        if let Some(include) = &self.include_list {
            return include.iter().any(|t| t == tag);
        }
        match &self.exclude_list {
            Some(exclude) => !exclude.iter().any(|t| t == tag),
            None => true,
        }
    }
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub warnings: Vec<TagWarning>,
}

/// Run every recorded tag against `declaration`.
///
/// Processors run one at a time in [`TagProcessor::ORDER`], each over its
/// records in array order. Work items are resolved against the declaration as
/// it stands when their processor starts. The first error aborts the rest.
pub async fn process(
    ctx: &mut Context,
    services: &TagServices,
    declaration: &mut Value,
    original: &Value,
    records: &[TagRecord],
    options: &ProcessOptions,
) -> ProcessResult<ProcessOutcome> {
    if !declaration.is_object() {
        return Err(ProcessError::InvalidDeclaration);
    }
    ctx.current_task()?;

    let mut warnings = Vec::new();
    let mut batches: Vec<(TagProcessor, Vec<&TagRecord>)> =
        TagProcessor::ORDER.iter().map(|p| (*p, Vec::new())).collect();

    for record in records.iter().filter(|record| options.allows(&record.tag)) {
        match TagProcessor::from_tag(&record.tag) {
            Some(processor) => {
                if let Some((_, batch)) = batches.iter_mut().find(|(p, _)| *p == processor) {
                    batch.push(record);
                }
            }
            None => {
                warn!(tag = %record.tag, path = %record.instance_path, "Unknown tag");
                warnings.push(TagWarning::new(
                    &record.tag,
                    &record.instance_path,
                    "unknown tag, not processed",
                ));
            }
        }
    }

    for (processor, batch) in batches {
        if batch.is_empty() {
            continue;
        }
        let items: Vec<TagWorkItem> = batch
            .into_iter()
            .map(|record| TagWorkItem::resolve(record, declaration))
            .collect();
        debug!(tag = processor.tag(), items = items.len(), "Running tag processor");

        let produced = processor
            .run(ctx, services, declaration, original, &items)
            .await?;
        warnings.extend(produced);
    }

    Ok(ProcessOutcome { warnings })
}
