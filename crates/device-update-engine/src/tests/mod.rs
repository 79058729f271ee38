//! Update protocol tests against a scripted device.


use crate::{SCRIPT_TASK_PATH, WHITELIST_PATH};
use device_rpc::testing::{ScriptedDeviceRpc, ScriptedReply};
use device_rpc::{ControlContext, Method, UPLOAD_PATH_PREFIX};
use request_context::Context;
use serde_json::json;
use std::sync::Arc;

pub(crate) const TASK_PATH: &str = "/mgmt/tm/task/cli/script/42";

pub(crate) fn context() -> Context {
    let mut ctx = Context::default();
    ctx.control = ControlContext::new("192.0.2.10", 443);
    ctx
}

/// Device answering every update step successfully.
pub(crate) fn happy_device() -> Arc<ScriptedDeviceRpc> {
    let rpc = Arc::new(ScriptedDeviceRpc::new());
    rpc.always(
        Method::Get,
        WHITELIST_PATH,
        ScriptedReply::ok(json!({
            "fileWhitelistPathPrefix": "{/var/config/rest/downloads/appsvcs_update.cli} {/tmp/}"
        })),
    );
    rpc.always(Method::Post, UPLOAD_PATH_PREFIX, ScriptedReply::ok(json!({})));
    rpc.always(Method::Post, crate::CONFIG_PATH, ScriptedReply::ok(json!({})));
    script_task(&rpc);
    rpc
}

/// Script task creation and start; polls are left to each test.
pub(crate) fn script_task(rpc: &ScriptedDeviceRpc) {
    rpc.always(Method::Post, SCRIPT_TASK_PATH, ScriptedReply::ok(json!({"_taskId": "42"})));
    rpc.always(Method::Put, SCRIPT_TASK_PATH, ScriptedReply::ok(json!({})));
    rpc.always(Method::Delete, SCRIPT_TASK_PATH, ScriptedReply::ok(json!({})));
}

pub(crate) fn task_state(state: &str) -> ScriptedReply {
    ScriptedReply::ok(json!({ "_taskId": "42", "_taskState": state }))
}
