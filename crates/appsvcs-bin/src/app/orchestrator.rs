//! The apply pipeline: discover, lock, post-process, update, release.

use super::bundle::Bundle;
use super::discovery::discover_target;
use super::error::{ApplyError, ApplyResult};
use device_mutex::MutexCoordinator;
use device_rpc::DeviceRpc;
use device_update_engine::{UpdateEngine, UpdateOutcome};
use request_context::Context;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tag_post_processing::{process, TagServices, TagWarning};
use tracing::{info, warn};

/// What one applied bundle produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    /// Declaration after post-processing.
    pub declaration: Value,
    pub warnings: Vec<TagWarning>,
    pub update: UpdateOutcome,
}

/// Applies bundles to one device.
pub struct Orchestrator {
    rpc: Arc<dyn DeviceRpc>,
    services: TagServices,
    mutex: MutexCoordinator,
    engine: UpdateEngine,
}

impl Orchestrator {
    pub fn new(rpc: Arc<dyn DeviceRpc>, services: TagServices) -> Self {
        Self {
            mutex: MutexCoordinator::new(rpc.clone()),
            engine: UpdateEngine::new(rpc.clone()),
            services,
            rpc,
        }
    }

    /// Run one bundle under the device configuration lock.
    ///
    /// The lock is released whether or not post-processing and the update
    /// succeed.
    pub async fn apply(&self, ctx: &mut Context, bundle: Bundle) -> ApplyResult<ApplyReport> {
        discover_target(self.rpc.as_ref(), ctx)
            .await
            .map_err(ApplyError::Discovery)?;
        ctx.current_task_mut()?.dry_run = bundle.dry_run;

        let handle = self.mutex.acquire(ctx).await?;
        let result = self.apply_locked(ctx, bundle).await;
        if let Err(err) = self.mutex.release(ctx, Some(handle)).await {
            warn!(error = %err, "Failed to release configuration lock");
        }

        if let Ok(report) = &result {
            info!(
                host = %ctx.control.identity(),
                dry_run = report.update.dry_run,
                warnings = report.warnings.len(),
                "Bundle applied"
            );
        }
        result
    }

    async fn apply_locked(&self, ctx: &mut Context, bundle: Bundle) -> ApplyResult<ApplyReport> {
        let mut declaration = bundle.declaration;
        let original = bundle.original.unwrap_or_else(|| declaration.clone());

        let outcome = process(
            ctx,
            &self.services,
            &mut declaration,
            &original,
            &bundle.tag_records,
            &bundle.options,
        )
        .await?;

        let update = self.engine.submit(ctx, &bundle.update, &bundle.diff).await?;

        Ok(ApplyReport {
            declaration,
            warnings: outcome.warnings,
            update,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::discovery::{DEVICE_INFO_PATH, PROVISION_PATH};
    use device_mutex::{LOCK_COLLECTION_PATH, LOCK_PATH};
    use device_rpc::testing::{ScriptedDeviceRpc, ScriptedReply};
    use device_rpc::{ControlContext, Method};
    use device_update_engine::UpdatePayload;
    use serde_json::json;
    use tag_post_processing::{ProcessOptions, TagRecord};

    fn device() -> Arc<ScriptedDeviceRpc> {
        let rpc = Arc::new(ScriptedDeviceRpc::new());
        rpc.always(
            Method::Get,
            DEVICE_INFO_PATH,
            ScriptedReply::ok(json!({"product": "BIG-IP", "version": "15.1.0"})),
        );
        rpc.always(
            Method::Get,
            PROVISION_PATH,
            ScriptedReply::ok(json!({"items": [{"name": "ltm", "level": "nominal"}]})),
        );
        rpc.always(Method::Post, LOCK_COLLECTION_PATH, ScriptedReply::ok(json!({})));
        rpc.always(Method::Delete, LOCK_PATH, ScriptedReply::ok(json!({})));
        rpc
    }

    fn context() -> Context {
        let mut ctx = Context::default();
        ctx.control = ControlContext::new("192.0.2.10", 443);
        ctx.target.host = "192.0.2.10".to_string();
        ctx
    }

    fn bundle(tag_records: Vec<TagRecord>) -> Bundle {
        Bundle {
            declaration: json!({
                "class": "ADC",
                "T": {"class": "Tenant", "A": {"class": "Application", "waf": {"class": "WAF_Policy"}}}
            }),
            original: None,
            tag_records,
            options: ProcessOptions::default(),
            update: UpdatePayload {
                script: "cli script __appsvcs_update {\n}\n".to_string(),
                ..UpdatePayload::default()
            },
            diff: json!([]),
            dry_run: true,
        }
    }

    fn orchestrator(rpc: &Arc<ScriptedDeviceRpc>) -> Orchestrator {
        let rpc: Arc<dyn DeviceRpc> = rpc.clone();
        Orchestrator::new(rpc.clone(), TagServices::new(rpc).unwrap())
    }

    #[tokio::test]
    async fn dry_run_locks_and_releases() {
        let rpc = device();
        let mut ctx = context();

        let report = orchestrator(&rpc).apply(&mut ctx, bundle(Vec::new())).await.unwrap();

        assert!(report.update.dry_run);
        assert_eq!(report.update.line_count, 2);
        assert!(report.warnings.is_empty());
        assert_eq!(ctx.target.tmos_version, "15.1.0");
        assert_eq!(rpc.count(Method::Post, LOCK_COLLECTION_PATH), 1);
        assert_eq!(rpc.count(Method::Delete, LOCK_PATH), 1);
    }

    #[tokio::test]
    async fn unknown_tags_are_reported() {
        let rpc = device();
        let mut ctx = context();
        let records = vec![TagRecord::new("mystery", "/T/A/waf", json!(true))];

        let report = orchestrator(&rpc).apply(&mut ctx, bundle(records)).await.unwrap();

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].tag, "mystery");
    }

    #[tokio::test]
    async fn validation_failure_still_releases_lock() {
        let rpc = device();
        let mut ctx = context();
        let records = vec![TagRecord::new("modules", "/T/A/waf", json!(["asm"]))];

        let err = orchestrator(&rpc)
            .apply(&mut ctx, bundle(records))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::Process(_)));
        assert_eq!(err.status_code(), 422);
        assert_eq!(rpc.count(Method::Delete, LOCK_PATH), 1);
    }

    #[tokio::test]
    async fn busy_device_is_not_touched() {
        let rpc = device();
        rpc.on(Method::Post, LOCK_COLLECTION_PATH, ScriptedReply::error(409, "already exists"));
        let fresh = now_ms().to_string();
        rpc.on(
            Method::Get,
            LOCK_PATH,
            ScriptedReply::ok(json!({"name": "____appsvcs_lock", "description": fresh})),
        );
        let mut ctx = context();

        let err = orchestrator(&rpc)
            .apply(&mut ctx, bundle(Vec::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::Lock(_)));
        assert_eq!(err.status_code(), 503);
        assert!(err.to_string().contains("please try again"));
        assert_eq!(rpc.count(Method::Delete, LOCK_PATH), 0);
    }

    #[tokio::test]
    async fn discovery_failure_stops_before_lock() {
        let rpc = Arc::new(ScriptedDeviceRpc::new());
        rpc.on(Method::Get, DEVICE_INFO_PATH, ScriptedReply::error(401, "Authentication failed"));
        let mut ctx = context();

        let err = orchestrator(&rpc)
            .apply(&mut ctx, bundle(Vec::new()))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 401);
        assert_eq!(rpc.count(Method::Post, LOCK_COLLECTION_PATH), 0);
    }

    fn now_ms() -> i64 {
        Context::default().device_now_ms()
    }
}
