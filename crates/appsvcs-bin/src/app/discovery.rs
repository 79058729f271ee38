//! Resolving target facts before any tag runs.

use device_rpc::{DeviceRpc, RpcRequest, RpcResult};
use request_context::{Context, DeviceType, ProvisionedModule};
use serde_json::Value;
use tracing::{info, warn};

pub const DEVICE_INFO_PATH: &str = "/mgmt/shared/identified-devices/config/device-info";
pub const PROVISION_PATH: &str = "/mgmt/tm/sys/provision";
pub const SERVICE_DISCOVERY_INFO_PATH: &str = "/mgmt/shared/service-discovery/info";

/// Fill `ctx.target` with the device class, version and provisioned modules.
///
/// BIG-IQ targets have no module provisioning, so the provision listing is
/// skipped for them.
pub async fn discover_target(rpc: &dyn DeviceRpc, ctx: &mut Context) -> RpcResult<()> {
    let info = rpc
        .call_json(&ctx.control, RpcRequest::get(DEVICE_INFO_PATH, "read device info"))
        .await?;

    let product = info.get("product").and_then(Value::as_str).unwrap_or("BIG-IP");
    ctx.target.device_type = DeviceType::from_product(product);
    if let Some(version) = info.get("version").and_then(Value::as_str) {
        ctx.target.tmos_version = version.to_string();
    }

    ctx.target.provisioned_modules = if ctx.target.is_big_iq() {
        Vec::new()
    } else {
        let listing = rpc
            .call_json(&ctx.control, RpcRequest::get(PROVISION_PATH, "read module provisioning"))
            .await?;
        listing
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(ProvisionedModule {
                            name: item.get("name")?.as_str()?.to_string(),
                            level: item
                                .get("level")
                                .and_then(Value::as_str)
                                .unwrap_or("none")
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    if ctx.target.is_local() {
        ctx.host.service_discovery_installed = service_discovery_installed(rpc, ctx).await;
    }

    info!(
        host = %ctx.control.identity(),
        device_type = ?ctx.target.device_type,
        version = %ctx.target.tmos_version,
        modules = ctx.target.provisioned_modules.len(),
        "Discovered target"
    );
    Ok(())
}

/// `Some(false)` only when the worker answers 404; other failures leave it unknown.
async fn service_discovery_installed(rpc: &dyn DeviceRpc, ctx: &Context) -> Option<bool> {
    let request = RpcRequest::get(SERVICE_DISCOVERY_INFO_PATH, "check service discovery");
    match rpc.call_json(&ctx.control, request).await {
        Ok(_) => Some(true),
        Err(err) if err.status_code() == Some(404) => Some(false),
        Err(err) => {
            warn!(error = %err, "Unable to determine whether Service Discovery is installed");
            None
        }
    }
}
