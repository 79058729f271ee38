//! The closed set of tag processors.

mod aliases;
mod big_component;
mod common_objects;
mod fetch;
mod min_version;
mod module;
mod pointer;
mod secret;
mod service_discovery;

pub use secret::{ENC_DEVICE, ENC_REMOTE, LONG_SECRET_REMOTE_LIMIT};

use crate::{ProcessResult, TagServices, TagWarning, TagWorkItem};
use common_objects::CommonKind;
use request_context::Context;
use secret::SecretKind;
use serde_json::Value;

/// Whether the declaration is being evaluated without side effects.
pub(crate) fn is_scratch(declaration: &Value) -> bool {
    declaration.get("scratch").is_some()
}

/// A tag processor.
///
/// [`TagProcessor::ORDER`] is the order processors run in within one dispatch
/// call: later processors see the mutations of earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagProcessor {
    Aliases,
    Pointer,
    Fetch,
    Secret,
    LongSecret,
    MinVersion,
    Module,
    ServiceDiscovery,
    Node,
    VirtualAddress,
    BigComponent,
}

impl TagProcessor {
    pub const ORDER: [TagProcessor; 11] = [
        TagProcessor::Aliases,
        TagProcessor::Pointer,
        TagProcessor::Fetch,
        TagProcessor::Secret,
        TagProcessor::LongSecret,
        TagProcessor::MinVersion,
        TagProcessor::Module,
        TagProcessor::ServiceDiscovery,
        TagProcessor::Node,
        TagProcessor::VirtualAddress,
        TagProcessor::BigComponent,
    ];

    /// Processor for a tag name.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|processor| processor.tag() == tag)
    }

    /// Tag name as recorded during schema validation.
    pub fn tag(self) -> &'static str {
        match self {
            TagProcessor::Aliases => "aliases",
            TagProcessor::Pointer => "pointer",
            TagProcessor::Fetch => "fetch",
            TagProcessor::Secret => "secret",
            TagProcessor::LongSecret => "longSecret",
            TagProcessor::MinVersion => "minVersion",
            TagProcessor::Module => "modules",
            TagProcessor::ServiceDiscovery => "serviceDiscovery",
            TagProcessor::Node => "node",
            TagProcessor::VirtualAddress => "virtualAddress",
            TagProcessor::BigComponent => "bigComponent",
        }
    }

    /// Run this processor over its work items.
    pub(crate) async fn run(
        self,
        ctx: &mut Context,
        services: &TagServices,
        declaration: &mut Value,
        original: &Value,
        items: &[TagWorkItem],
    ) -> ProcessResult<Vec<TagWarning>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            TagProcessor::Aliases => aliases::process(declaration, items),
            TagProcessor::Pointer => pointer::process(declaration, original, items),
            TagProcessor::Fetch => fetch::process(services, declaration, items).await,
            TagProcessor::Secret => {
                secret::process(SecretKind::Secret, ctx, services, declaration, items).await
            }
            TagProcessor::LongSecret => {
                secret::process(SecretKind::LongSecret, ctx, services, declaration, items).await
            }
            TagProcessor::MinVersion => min_version::process(ctx, declaration, items),
            TagProcessor::Module => module::process(ctx, declaration, items),
            TagProcessor::ServiceDiscovery => service_discovery::process(ctx, declaration, items),
            TagProcessor::Node => {
                common_objects::process(CommonKind::Node, ctx, services, declaration, items).await
            }
            TagProcessor::VirtualAddress => {
                common_objects::process(CommonKind::VirtualAddress, ctx, services, declaration, items)
                    .await
            }
            TagProcessor::BigComponent => big_component::process(ctx, services, declaration, items).await,
        }
    }
}
