//! Node and virtual-address references against pre-existing `/Common` objects.
//!
//! A declared address that matches a live `/Common` object is rewritten into
//! that object's full path so the device reuses it. A live object named like
//! the declared address but holding a different address is a collision.

use crate::processors::is_scratch;
use crate::{ProcessError, ProcessResult, TagServices, TagWarning, TagWorkItem};
use device_rpc::RpcRequest;
use request_context::Context;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommonKind {
    Node,
    VirtualAddress,
}

impl CommonKind {
    fn tag(self) -> &'static str {
        match self {
            CommonKind::Node => "node",
            CommonKind::VirtualAddress => "virtualAddress",
        }
    }

    fn endpoint(self) -> &'static str {
        match self {
            CommonKind::Node => "/mgmt/tm/ltm/node",
            CommonKind::VirtualAddress => "/mgmt/tm/ltm/virtual-address",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            CommonKind::Node => "node",
            CommonKind::VirtualAddress => "virtual address",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommonObject {
    name: String,
    #[serde(default)]
    partition: String,
    #[serde(default)]
    full_path: String,
    #[serde(default)]
    address: String,
}

impl CommonObject {
    fn full_path(&self) -> String {
        if self.full_path.is_empty() {
            format!("/{}/{}", self.partition, self.name)
        } else {
            self.full_path.clone()
        }
    }
}

/// Strip a route-domain suffix (`10.0.0.1%2` -> `10.0.0.1`).
fn bare_address(address: &str) -> &str {
    address.split('%').next().unwrap_or(address)
}

pub(crate) async fn process(
    kind: CommonKind,
    ctx: &mut Context,
    services: &TagServices,
    declaration: &mut Value,
    items: &[TagWorkItem],
) -> ProcessResult<Vec<TagWarning>> {
    let candidates: Vec<&TagWorkItem> = items
        .iter()
        .filter(|item| item.tenant != "Common")
        .filter(|item| matches!(item.data.as_str(), Some(address) if !address.starts_with('/')))
        .collect();
    if candidates.is_empty() || is_scratch(declaration) {
        return Ok(Vec::new());
    }

    // One listing per batch.
    let request = RpcRequest::get(
        format!("{}?$select=name,partition,fullPath,address", kind.endpoint()),
        format!("list existing {}s", kind.noun()),
    );
    let listing = services.rpc.call_json(&ctx.control, request).await?;
    let existing: Vec<CommonObject> = listing
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .filter(|object: &CommonObject| object.partition == "Common" || object.full_path.starts_with("/Common/"))
                .collect()
        })
        .unwrap_or_default();

    for item in candidates {
        let Some(address) = item.data.as_str() else {
            continue;
        };

        if let Some(clash) = existing
            .iter()
            .find(|object| object.name == address && bare_address(&object.address) != bare_address(address))
        {
            return Err(ProcessError::validation(
                &item.instance_path,
                kind.tag(),
                format!(
                    "{}: {} {} already exists with address {}",
                    item.instance_path,
                    kind.noun(),
                    clash.full_path(),
                    clash.address
                ),
            ));
        }

        let Some(matched) = existing
            .iter()
            .find(|object| bare_address(&object.address) == bare_address(address))
        else {
            continue;
        };

        let full_path = matched.full_path();
        debug!(path = %item.instance_path, reference = %full_path, "Using existing /Common object");
        if let Some(slot) = declaration.pointer_mut(&item.instance_path) {
            *slot = Value::String(full_path.clone());
        }
        ctx.current_task_mut()?
            .record_metadata(&item.instance_path, "commonReference", Value::String(full_path));
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::harness::{services, ScriptedSetup};
    use crate::TagRecord;
    use device_rpc::Method;
    use serde_json::json;

    fn items(declaration: &Value, tag: &str, paths: &[&str]) -> Vec<TagWorkItem> {
        paths
            .iter()
            .map(|path| TagWorkItem::resolve(&TagRecord::new(tag, *path, Value::Null), declaration))
            .collect()
    }

    #[tokio::test]
    async fn node_address_rewritten_to_common_node() {
        let setup = ScriptedSetup::new();
        setup.rpc.on(
            Method::Get,
            "/mgmt/tm/ltm/node",
            device_rpc::testing::ScriptedReply::ok(json!({"items": [
                {"name": "web1", "partition": "Common", "fullPath": "/Common/web1", "address": "10.0.0.1%0"}
            ]})),
        );
        let mut ctx = setup.context();
        let mut declaration = json!({"T": {"A": {"pool": {"members": [{"servers": ["10.0.0.1", "10.0.0.2"]}]}}}});
        let work = items(
            &declaration,
            "node",
            &["/T/A/pool/members/0/servers/0", "/T/A/pool/members/0/servers/1"],
        );

        process(CommonKind::Node, &mut ctx, &services(&setup), &mut declaration, &work)
            .await
            .unwrap();

        assert_eq!(
            declaration["T"]["A"]["pool"]["members"][0]["servers"],
            json!(["/Common/web1", "10.0.0.2"])
        );
        assert_eq!(setup.rpc.count(Method::Get, "/mgmt/tm/ltm/node"), 1);
        assert_eq!(
            ctx.current_task().unwrap().metadata_for("/T/A/pool/members/0/servers/0"),
            Some(&json!({"commonReference": "/Common/web1"}))
        );
    }

    #[tokio::test]
    async fn virtual_address_name_collision_fails() {
        let setup = ScriptedSetup::new();
        setup.rpc.on(
            Method::Get,
            "/mgmt/tm/ltm/virtual-address",
            device_rpc::testing::ScriptedReply::ok(json!({"items": [
                {"name": "10.1.1.1", "partition": "Common", "fullPath": "/Common/10.1.1.1", "address": "10.9.9.9"}
            ]})),
        );
        let mut ctx = setup.context();
        let mut declaration = json!({"T": {"A": {"vs": {"virtualAddresses": ["10.1.1.1"]}}}});
        let work = items(&declaration, "virtualAddress", &["/T/A/vs/virtualAddresses/0"]);

        let err = process(CommonKind::VirtualAddress, &mut ctx, &services(&setup), &mut declaration, &work)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert!(err.to_string().contains("already exists with address 10.9.9.9"));
    }

    #[tokio::test]
    async fn paths_and_scratch_make_no_calls() {
        let setup = ScriptedSetup::new();
        let mut ctx = setup.context();
        let mut declaration = json!({"T": {"A": {"vs": {"virtualAddresses": ["/Common/va"]}}}});
        let work = items(&declaration, "virtualAddress", &["/T/A/vs/virtualAddresses/0"]);
        process(CommonKind::VirtualAddress, &mut ctx, &services(&setup), &mut declaration, &work)
            .await
            .unwrap();

        let mut scratch = json!({"scratch": "test", "T": {"A": {"vs": {"virtualAddresses": ["10.1.1.1"]}}}});
        let work = items(&scratch, "virtualAddress", &["/T/A/vs/virtualAddresses/0"]);
        process(CommonKind::VirtualAddress, &mut ctx, &services(&setup), &mut scratch, &work)
            .await
            .unwrap();

        assert!(setup.rpc.calls().is_empty());
    }
}
