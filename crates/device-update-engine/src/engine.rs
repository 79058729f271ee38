//! The update protocol.

use crate::{
    ensure_whitelisted, run_script, RunScriptConfig, UpdateError, UpdateOutcome, UpdatePayload,
    UpdateResult,
};
use device_rpc::{upload_bytes, DeviceRpc, RpcError, RpcRequest};
use futures_util::future::try_join_all;
use request_context::Context;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// File name of the uploaded script.
pub const UPDATE_FILE_NAME: &str = "appsvcs_update.cli";
/// On-device path of the uploaded script.
pub const UPDATE_FILE_PATH: &str = "/var/config/rest/downloads/appsvcs_update.cli";
/// Configuration load/merge endpoint.
pub const CONFIG_PATH: &str = "/mgmt/tm/sys/config";
/// Data group the script writes its failures to.
pub const SENTINEL_PATH: &str = "/mgmt/tm/ltm/data-group/internal/~Common~____appsvcs_update";

/// Uploads and applies rendered updates.
pub struct UpdateEngine {
    rpc: Arc<dyn DeviceRpc>,
    run_config: RunScriptConfig,
}

impl UpdateEngine {
    pub fn new(rpc: Arc<dyn DeviceRpc>) -> Self {
        Self::with_config(rpc, RunScriptConfig::default())
    }

    pub fn with_config(rpc: Arc<dyn DeviceRpc>, run_config: RunScriptConfig) -> Self {
        Self { rpc, run_config }
    }

    /// Apply `payload` to the device of the current task.
    pub async fn submit(
        &self,
        ctx: &Context,
        payload: &UpdatePayload,
        diff: &Value,
    ) -> UpdateResult<UpdateOutcome> {
        let settings = ctx.settings.snapshot();
        let line_count = payload.line_count();

        if ctx.log.trace {
            write_trace(ctx.log.trace_file.as_deref(), &payload.script).await;
        }

        if ctx.current_task()?.dry_run {
            info!(lines = line_count, "Dry run, device left untouched");
            return Ok(UpdateOutcome {
                dry_run: true,
                line_count,
                changes: settings.is_debug().then(|| diff.clone()),
            });
        }

        let control = &ctx.control;
        let rpc = self.rpc.as_ref();

        let started = Instant::now();
        let mut required = vec![UPDATE_FILE_PATH.to_string()];
        required.extend(payload.whitelist_files.iter().cloned());
        ensure_whitelisted(rpc, control, &required).await?;
        debug!(step = "whitelist", elapsed_ms = started.elapsed().as_millis() as u64, "Update step done");

        let started = Instant::now();
        if settings.serialize_file_uploads {
            for call in &payload.pre_script_calls {
                rpc.call_json(control, call.clone()).await?;
            }
        } else {
            try_join_all(
                payload
                    .pre_script_calls
                    .iter()
                    .map(|call| rpc.call_json(control, call.clone())),
            )
            .await?;
        }
        debug!(
            step = "pre-script calls",
            calls = payload.pre_script_calls.len(),
            serialized = settings.serialize_file_uploads,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Update step done"
        );

        let started = Instant::now();
        let uploaded = upload_bytes(rpc, control, UPDATE_FILE_NAME, payload.script.as_bytes(), "upload update script").await?;
        debug!(step = "upload", path = %uploaded, elapsed_ms = started.elapsed().as_millis() as u64, "Update step done");

        let started = Instant::now();
        rpc.call_json(
            control,
            RpcRequest::post(CONFIG_PATH, "merge update script").with_json(json!({
                "command": "load",
                "options": [{ "file": uploaded }, { "merge": true }],
            })),
        )
        .await?;
        debug!(step = "merge", elapsed_ms = started.elapsed().as_millis() as u64, "Update step done");

        let started = Instant::now();
        let mut script_failure = match run_script(rpc, control, &self.run_config).await {
            Ok(()) => None,
            Err(err) => {
                warn!(error = %err, "Update script failed");
                Some(err.to_string())
            }
        };
        debug!(step = "run", elapsed_ms = started.elapsed().as_millis() as u64, "Update step done");

        if let Some(reported) = self.read_sentinel(ctx).await? {
            script_failure = Some(reported);
        }

        upload_bytes(rpc, control, UPDATE_FILE_NAME, b" ", "overwrite update script").await?;

        match script_failure {
            Some(message) => Err(UpdateError::ScriptFailure(message)),
            None => {
                info!(host = %control.identity(), lines = line_count, "Update applied");
                Ok(UpdateOutcome {
                    dry_run: false,
                    line_count,
                    changes: None,
                })
            }
        }
    }

    /// Failure text the script left behind, if any.
    async fn read_sentinel(&self, ctx: &Context) -> UpdateResult<Option<String>> {
        let response = self
            .rpc
            .call_crude(&ctx.control, RpcRequest::get(SENTINEL_PATH, "read update result"))
            .await?;

        if response.status_code == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(RpcError::Status {
                status_code: response.status_code,
                message: response.message(),
            }
            .into());
        }

        let reported: Vec<String> = response
            .body
            .get("records")
            .and_then(Value::as_array)
            .map(|records| {
                records
                    .iter()
                    .filter_map(|record| {
                        record
                            .get("data")
                            .or_else(|| record.get("name"))
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok((!reported.is_empty()).then(|| reported.join("; ")))
    }
}

async fn write_trace(path: Option<&Path>, script: &str) {
    let Some(path) = path else {
        warn!("Trace requested without a trace file");
        return;
    };
    if let Some(parent) = path.parent() {
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            warn!(path = %parent.display(), error = %err, "Failed to create trace directory");
            return;
        }
    }
    match tokio::fs::write(path, script).await {
        Ok(()) => debug!(path = %path.display(), "Wrote update trace"),
        Err(err) => warn!(path = %path.display(), error = %err, "Failed to write update trace"),
    }
}
