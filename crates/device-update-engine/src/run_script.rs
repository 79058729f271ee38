//! Running the merged update script as a device task.
//!
//! The task is created, moved to `VALIDATING`, then polled. The device keeps
//! reporting `VALIDATING` while the script runs. `FAILED` and `CANCELED` are
//! failures and any other state means the script completed.

use crate::{RunScriptConfig, UpdateError, UpdateResult};
use device_rpc::{ControlContext, DeviceRpc, RpcError, RpcRequest};
use serde_json::{json, Value};
use tracing::{debug, warn};

pub const SCRIPT_TASK_PATH: &str = "/mgmt/tm/task/cli/script";
/// Name of the CLI script the update merges into the configuration.
pub const SCRIPT_NAME: &str = "/Common/__appsvcs_update";

/// Errors worth another poll.
fn is_transient(err: &RpcError) -> bool {
    err.is_timeout() || matches!(err.status_code(), Some(400) | Some(504))
}

fn is_task_not_found(err: &RpcError) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("task not found") || message.contains("tasknotfound")
}

fn task_id(body: &Value) -> Option<String> {
    match body.get("_taskId")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Run the update script and wait for it to finish.
pub async fn run_script(
    rpc: &dyn DeviceRpc,
    control: &ControlContext,
    config: &RunScriptConfig,
) -> UpdateResult<()> {
    let created = rpc
        .call_json(
            control,
            RpcRequest::post(SCRIPT_TASK_PATH, "create script task")
                .with_json(json!({ "command": "run", "name": SCRIPT_NAME })),
        )
        .await?;
    let id = task_id(&created)
        .ok_or_else(|| RpcError::UnexpectedResponse("script task reply has no _taskId".to_string()))?;
    let task_path = format!("{SCRIPT_TASK_PATH}/{id}");

    rpc.call_json(
        control,
        RpcRequest::put(&task_path, "start script task").with_json(json!({ "_taskState": "VALIDATING" })),
    )
    .await?;

    let result = poll_task(rpc, control, config, &id, &task_path).await;

    if !matches!(result, Err(UpdateError::TaskLost(_))) {
        if let Err(err) = rpc
            .call_json(control, RpcRequest::delete(&task_path, "remove script task"))
            .await
        {
            warn!(task = %id, error = %err, "Failed to remove script task");
        }
    }
    result
}

async fn poll_task(
    rpc: &dyn DeviceRpc,
    control: &ControlContext,
    config: &RunScriptConfig,
    id: &str,
    task_path: &str,
) -> UpdateResult<()> {
    let mut remaining = config.max_attempts;

    while remaining > 0 {
        remaining -= 1;

        let status = match rpc
            .call_json(control, RpcRequest::get(task_path, "check script task"))
            .await
        {
            Ok(status) => status,
            Err(err) if is_task_not_found(&err) => {
                return Err(UpdateError::TaskLost(format!(
                    "The script task {id} is no longer known to the device ({err}). \
                     The device management service may have restarted during the update; \
                     verify the device configuration before resubmitting."
                )));
            }
            Err(err) if is_transient(&err) => {
                debug!(task = %id, error = %err, remaining, "Retrying script task check");
                tokio::time::sleep(config.poll_interval).await;
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let state = status.get("_taskState").and_then(Value::as_str).unwrap_or_default();
        match state {
            "FAILED" | "CANCELED" => {
                let detail = status
                    .get("errorMessage")
                    .and_then(Value::as_str)
                    .unwrap_or(state);
                return Err(UpdateError::TaskFailed(format!("failed during execution of the update script: {detail}")));
            }
            "VALIDATING" => {
                debug!(task = %id, remaining, "Script task still running");
                tokio::time::sleep(config.poll_interval).await;
            }
            _ => return Ok(()),
        }
    }

    Err(UpdateError::TaskTimeout(format!(
        "The update script is taking longer than expected (task {id}); check the device for the final result"
    )))
}
