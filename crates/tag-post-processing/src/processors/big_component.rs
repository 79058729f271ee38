//! Existence checks for referenced native objects (`{ "bigip": "/Common/x" }`).
//!
//! The owning sub-module of a referenced object is not always known, so most
//! component types are checked by creating the object: 409 means it already
//! exists, 200 means it did not (the accidental object is deleted again) and
//! 404 means the type itself is absent. Virtual addresses are read instead so
//! their mask can be recorded. ASM policies are matched against one listing
//! of all policies.
//!
//! Identical checks are issued once per batch. Each check runs as its own
//! task, so a check that loses a race still completes and its result is
//! simply not used.

use crate::first_success::first_success;
use crate::processors::is_scratch;
use crate::{ProcessError, ProcessResult, TagServices, TagWarning, TagWorkItem};
use device_rpc::{ControlContext, DeviceRpc, RpcError, RpcRequest};
use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use request_context::Context;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const TAG: &str = "bigComponent";
const ASM_POLICY: &str = "asm policy";
const ASM_POLICIES_PATH: &str = "/mgmt/tm/asm/policies?$select=name,fullPath";

/// Component types checked with a read instead of a create.
const READ_CHECKED: &[&str] = &["ltm virtual-address"];

#[derive(Debug, Clone, PartialEq)]
enum Presence {
    /// Exists; carries metadata to record when the check was a read.
    Found(Option<Map<String, Value>>),
    Absent,
}

#[derive(Debug, Clone, PartialEq)]
struct CheckFailure {
    status_code: Option<u16>,
    timeout: bool,
    message: String,
}

impl From<RpcError> for CheckFailure {
    fn from(err: RpcError) -> Self {
        Self {
            status_code: err.status_code(),
            timeout: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

impl From<CheckFailure> for RpcError {
    fn from(failure: CheckFailure) -> Self {
        if failure.timeout {
            return RpcError::Timeout(failure.message);
        }
        RpcError::Status {
            status_code: failure.status_code.unwrap_or(500),
            message: failure.message,
        }
    }
}

type CheckResult = Result<Presence, CheckFailure>;
type SharedCheck = Shared<BoxFuture<'static, CheckResult>>;

/// How one (component type, object path) pair is checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Check {
    Create { endpoint: String, path: String },
    Read { endpoint: String, path: String },
    AsmPolicy { path: String },
}

impl Check {
    fn for_component(component: &str, path: &str) -> Self {
        let component = component.trim();
        if component == ASM_POLICY {
            return Check::AsmPolicy {
                path: path.to_string(),
            };
        }
        let endpoint = if component.starts_with("/mgmt/") {
            component.trim_end_matches('/').to_string()
        } else {
            format!("/mgmt/tm/{}", component.split_whitespace().collect::<Vec<_>>().join("/"))
        };
        if READ_CHECKED.contains(&component) {
            Check::Read {
                endpoint,
                path: path.to_string(),
            }
        } else {
            Check::Create {
                endpoint,
                path: path.to_string(),
            }
        }
    }
}

/// `/Common/Shared/x` -> (`Common`, Some(`Shared`), `x`).
fn split_path(path: &str) -> (String, Option<String>, String) {
    let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match parts.as_slice() {
        [name] => ("Common".to_string(), None, name.to_string()),
        [partition, name] => (partition.to_string(), None, name.to_string()),
        [partition, sub_path @ .., name] => (partition.to_string(), Some(sub_path.join("/")), name.to_string()),
        [] => ("Common".to_string(), None, String::new()),
    }
}

/// REST item id (`~Common~Shared~x`).
fn item_id(path: &str) -> String {
    path.replace('/', "~")
}

/// Quotes are only needed by the device for names with spaces; compare without them.
fn unquoted(path: &str) -> String {
    path.replace('"', "")
}

async fn check_create(
    rpc: Arc<dyn DeviceRpc>,
    control: ControlContext,
    endpoint: String,
    path: String,
) -> CheckResult {
    let (partition, sub_path, name) = split_path(&path);
    let mut body = json!({ "name": name, "partition": partition });
    if let Some(sub_path) = sub_path {
        body["subPath"] = Value::String(sub_path);
    }

    let response = rpc
        .call_crude(
            &control,
            RpcRequest::post(&endpoint, format!("check existence of {path}")).with_json(body),
        )
        .await?;

    match response.status_code {
        409 => Ok(Presence::Found(None)),
        404 => Ok(Presence::Absent),
        200 => {
            let rollback = RpcRequest::delete(
                format!("{}/{}", endpoint, item_id(&path)),
                format!("remove check object {path}"),
            );
            if let Err(err) = rpc.call_json(&control, rollback).await {
                warn!(path = %path, error = %err, "Failed to remove check object");
            }
            Ok(Presence::Absent)
        }
        status_code => Err(CheckFailure {
            status_code: Some(status_code),
            timeout: false,
            message: response.message(),
        }),
    }
}

async fn check_read(
    rpc: Arc<dyn DeviceRpc>,
    control: ControlContext,
    endpoint: String,
    path: String,
) -> CheckResult {
    let response = rpc
        .call_crude(
            &control,
            RpcRequest::get(format!("{}/{}", endpoint, item_id(&path)), format!("read {path}")),
        )
        .await?;

    match response.status_code {
        200 => {
            let mut metadata = Map::new();
            if let Some(mask) = response.body.get("mask") {
                metadata.insert("mask".to_string(), mask.clone());
            }
            if let Some(address) = response.body.get("address") {
                metadata.insert("address".to_string(), address.clone());
            }
            Ok(Presence::Found(Some(metadata)))
        }
        404 => Ok(Presence::Absent),
        status_code => Err(CheckFailure {
            status_code: Some(status_code),
            timeout: false,
            message: response.message(),
        }),
    }
}

async fn list_asm_policies(rpc: Arc<dyn DeviceRpc>, control: ControlContext) -> Result<Vec<String>, CheckFailure> {
    let listing = rpc
        .call_json(&control, RpcRequest::get(ASM_POLICIES_PATH, "list ASM policies"))
        .await?;
    Ok(listing
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("fullPath").and_then(Value::as_str))
                .map(unquoted)
                .collect()
        })
        .unwrap_or_default())
}

fn spawn_shared<F>(future: F) -> SharedCheck
where
    F: std::future::Future<Output = CheckResult> + Send + 'static,
{
    let handle = tokio::spawn(future);
    async move {
        handle.await.unwrap_or_else(|err| {
            Err(CheckFailure {
                status_code: None,
                timeout: false,
                message: format!("existence check aborted: {err}"),
            })
        })
    }
    .boxed()
    .shared()
}

/// Referenced object path of a work item, if it names one.
fn referenced_path(item: &TagWorkItem) -> Option<String> {
    match &item.data {
        Value::String(path) if path.starts_with('/') => Some(path.clone()),
        Value::Object(map) => map.get("bigip").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn components(item: &TagWorkItem) -> ProcessResult<Vec<String>> {
    match &item.schema_data {
        Value::String(component) => Ok(vec![component.clone()]),
        Value::Array(components) => components
            .iter()
            .map(|component| {
                component.as_str().map(str::to_string).ok_or_else(|| {
                    ProcessError::invalid_config(TAG, &item.instance_path, "component types must be strings")
                })
            })
            .collect(),
        _ => Err(ProcessError::invalid_config(
            TAG,
            &item.instance_path,
            "expected a component type or a list of component types",
        )),
    }
}

pub(crate) async fn process(
    ctx: &mut Context,
    services: &TagServices,
    declaration: &Value,
    items: &[TagWorkItem],
) -> ProcessResult<Vec<TagWarning>> {
    if items.is_empty() || is_scratch(declaration) {
        return Ok(Vec::new());
    }

    let mut checks: HashMap<Check, SharedCheck> = HashMap::new();
    let mut asm_listing: Option<Shared<BoxFuture<'static, Result<Vec<String>, CheckFailure>>>> = None;
    let mut plans: Vec<(&TagWorkItem, String, Vec<SharedCheck>)> = Vec::new();

    for item in items {
        let Some(path) = referenced_path(item) else {
            continue;
        };
        let mut candidates = Vec::new();
        for component in components(item)? {
            let check = Check::for_component(&component, &path);
            if let Some(existing) = checks.get(&check) {
                candidates.push(existing.clone());
                continue;
            }

            let rpc = services.rpc.clone();
            let control = ctx.control.clone();
            let shared = match check.clone() {
                Check::Create { endpoint, path } => spawn_shared(check_create(rpc, control, endpoint, path)),
                Check::Read { endpoint, path } => spawn_shared(check_read(rpc, control, endpoint, path)),
                Check::AsmPolicy { path } => {
                    let listing = asm_listing
                        .get_or_insert_with(|| {
                            let handle = tokio::spawn(list_asm_policies(rpc, control));
                            async move {
                                handle.await.unwrap_or_else(|err| {
                                    Err(CheckFailure {
                                        status_code: None,
                                        timeout: false,
                                        message: format!("policy listing aborted: {err}"),
                                    })
                                })
                            }
                            .boxed()
                            .shared()
                        })
                        .clone();
                    let wanted = unquoted(&path);
                    async move {
                        match listing.await {
                            Ok(policies) if policies.contains(&wanted) => Ok(Presence::Found(None)),
                            Ok(_) => Ok(Presence::Absent),
                            Err(failure) => Err(failure),
                        }
                    }
                    .boxed()
                    .shared()
                }
            };
            checks.insert(check, shared.clone());
            candidates.push(shared);
        }
        plans.push((item, path, candidates));
    }

    debug!(items = plans.len(), requests = checks.len(), "Checking referenced components");

    let races = plans.iter().map(|(_, _, candidates)| {
        first_success(candidates.iter().cloned().map(|check| async move {
            match check.await {
                Ok(Presence::Found(metadata)) => Ok(metadata),
                Ok(Presence::Absent) => Err(None),
                Err(failure) => Err(Some(failure)),
            }
        }))
    });
    let outcomes = join_all(races).await;

    for ((item, path, _), outcome) in plans.iter().zip(outcomes) {
        match outcome {
            Ok(Some(metadata)) => {
                let task = ctx.current_task_mut()?;
                for (key, value) in metadata {
                    task.record_metadata(&item.instance_path, &key, value);
                }
            }
            Ok(None) => {}
            Err(errors) => {
                if let Some(failure) = errors.into_iter().flatten().next() {
                    return Err(ProcessError::Transport(failure.into()));
                }
                return Err(ProcessError::validation(
                    &item.instance_path,
                    TAG,
                    format!("{}: {} does not exist", item.instance_path, path),
                ));
            }
        }
    }
    Ok(Vec::new())
}
