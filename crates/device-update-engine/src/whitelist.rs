//! Script file whitelist on the device.

use device_rpc::{ControlContext, DeviceRpc, RpcRequest, RpcResult};
use serde_json::{json, Value};
use tracing::debug;

pub const WHITELIST_PATH: &str = "/mgmt/tm/sys/global-settings";

/// Parse `{/a/} {/b/}` into its entries.
pub fn parse_whitelist(raw: &str) -> Vec<String> {
    raw.split(['{', '}'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .flat_map(|entry| entry.split_whitespace())
        .map(str::to_string)
        .collect()
}

fn format_whitelist(entries: &[String]) -> String {
    entries
        .iter()
        .map(|entry| format!("{{{entry}}}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Make sure every file in `required` is whitelisted, patching only when needed.
///
/// Returns whether a patch was sent.
pub async fn ensure_whitelisted(
    rpc: &dyn DeviceRpc,
    control: &ControlContext,
    required: &[String],
) -> RpcResult<bool> {
    let settings = rpc
        .call_json(control, RpcRequest::get(WHITELIST_PATH, "read script whitelist"))
        .await?;
    let mut entries = parse_whitelist(
        settings
            .get("fileWhitelistPathPrefix")
            .and_then(Value::as_str)
            .unwrap_or_default(),
    );

    let missing: Vec<String> = required
        .iter()
        .filter(|file| !entries.contains(file))
        .cloned()
        .collect();
    if missing.is_empty() {
        debug!("Script whitelist already complete");
        return Ok(false);
    }

    for file in missing {
        if !entries.contains(&file) {
            entries.push(file);
        }
    }
    rpc.call_json(
        control,
        RpcRequest::patch(WHITELIST_PATH, "extend script whitelist")
            .with_json(json!({ "fileWhitelistPathPrefix": format_whitelist(&entries) })),
    )
    .await?;
    Ok(true)
}
