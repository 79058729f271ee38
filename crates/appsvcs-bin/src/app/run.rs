//! Command entry points.

use super::bundle::Bundle;
use super::orchestrator::{ApplyReport, Orchestrator};
use super::target::DeviceTarget;
use anyhow::Context as _;
use appsvcs_config_and_utils::{Paths, SettingsStore};
use device_rpc::{copy_to_host, ControlContext, Credentials, DeviceRpc, HttpDeviceRpc};
use request_context::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tag_post_processing::TagServices;
use tokio::sync::mpsc;
use tracing::info;
use work_queue::WorkQueue;

/// Switches for `apply`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    pub trace: bool,
    pub verify_tls: bool,
}

/// Per-bundle line printed to stdout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BundleResult {
    bundle: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ApplyReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

struct Job {
    path: PathBuf,
    bundle: Bundle,
}

/// Copy a local file to the target's downloads directory.
pub async fn run_upload(
    target: &DeviceTarget,
    credentials: Credentials,
    local_path: &Path,
    verify_tls: bool,
) -> anyhow::Result<String> {
    let rpc = HttpDeviceRpc::new(!verify_tls)?;
    let control = ControlContext {
        credentials: Some(credentials),
        ..ControlContext::new(&target.host, target.port)
    };
    let remote = copy_to_host(&rpc, &control, local_path)
        .await
        .with_context(|| format!("failed to copy {} to {target}", local_path.display()))?;
    Ok(remote)
}

/// Apply every bundle to the target, one at a time, in the order given.
///
/// Returns whether every bundle succeeded.
pub async fn run_apply(
    settings: SettingsStore,
    paths: &Paths,
    target: &DeviceTarget,
    credentials: Credentials,
    bundle_paths: Vec<PathBuf>,
    options: ApplyOptions,
) -> anyhow::Result<bool> {
    let mut jobs = Vec::with_capacity(bundle_paths.len());
    for path in bundle_paths {
        let bundle = Bundle::load(&path)?;
        jobs.push(Job { path, bundle });
    }

    let rpc: Arc<dyn DeviceRpc> = Arc::new(HttpDeviceRpc::new(!options.verify_tls)?);
    let services = TagServices::new(rpc.clone()).context("failed to build resource fetcher")?;
    let orchestrator = Arc::new(Orchestrator::new(rpc, services));

    let mut base_ctx = Context::for_target(settings, &target.host, target.port, credentials);
    if options.trace {
        paths.ensure_dirs()?;
        base_ctx.log.trace = true;
        base_ctx.log.trace_file = Some(paths.trace_file(&target.to_string()));
    }

    let results = apply_queued(orchestrator, base_ctx, jobs).await;

    let mut all_ok = true;
    for result in &results {
        all_ok &= result.error.is_none();
        println!("{}", serde_json::to_string(result)?);
    }
    info!(bundles = results.len(), all_ok, "Apply finished");
    Ok(all_ok)
}

/// Push `jobs` through a work queue drained by a single worker.
async fn apply_queued(
    orchestrator: Arc<Orchestrator>,
    base_ctx: Context,
    jobs: Vec<Job>,
) -> Vec<BundleResult> {
    let expected = jobs.len();
    let queue = Arc::new(WorkQueue::new());
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let worker = tokio::spawn({
        let queue = queue.clone();
        async move {
            queue
                .delegate(|job: Job| {
                    let orchestrator = orchestrator.clone();
                    let done_tx = done_tx.clone();
                    let mut ctx = base_ctx.clone();
                    async move {
                        info!(bundle = %job.path.display(), "Applying bundle");
                        let result = orchestrator.apply(&mut ctx, job.bundle).await;
                        let (line, outcome) = match result {
                            Ok(report) => (
                                BundleResult {
                                    bundle: job.path,
                                    report: Some(report),
                                    status_code: None,
                                    error: None,
                                },
                                Ok(()),
                            ),
                            Err(err) => (
                                BundleResult {
                                    bundle: job.path,
                                    report: None,
                                    status_code: Some(err.status_code()),
                                    error: Some(err.to_string()),
                                },
                                Err(err),
                            ),
                        };
                        let _ = done_tx.send(line);
                        outcome
                    }
                })
                .await
        }
    });

    for job in jobs {
        queue.push(job).await;
    }

    let mut results = Vec::with_capacity(expected);
    while results.len() < expected {
        match done_rx.recv().await {
            Some(result) => results.push(result),
            None => break,
        }
    }
    worker.abort();
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::discovery::{DEVICE_INFO_PATH, PROVISION_PATH};
    use device_mutex::{LOCK_COLLECTION_PATH, LOCK_PATH};
    use device_rpc::testing::{ScriptedDeviceRpc, ScriptedReply};
    use device_rpc::Method;
    use serde_json::json;

    fn job(name: &str, declaration: serde_json::Value) -> Job {
        let bundle: Bundle = serde_json::from_value(json!({
            "declaration": declaration,
            "update": {"script": "cli script __appsvcs_update {}"},
            "dryRun": true
        }))
        .unwrap();
        Job {
            path: PathBuf::from(name),
            bundle,
        }
    }

    #[tokio::test]
    async fn bundles_run_in_order_and_failures_do_not_stop_the_worker() {
        let rpc = Arc::new(ScriptedDeviceRpc::new());
        rpc.always(Method::Get, DEVICE_INFO_PATH, ScriptedReply::ok(json!({"product": "BIG-IP", "version": "15.1.0"})));
        rpc.always(Method::Get, PROVISION_PATH, ScriptedReply::ok(json!({"items": []})));
        rpc.always(Method::Post, LOCK_COLLECTION_PATH, ScriptedReply::ok(json!({})));
        rpc.always(Method::Delete, LOCK_PATH, ScriptedReply::ok(json!({})));

        let dyn_rpc: Arc<dyn DeviceRpc> = rpc.clone();
        let orchestrator = Arc::new(Orchestrator::new(
            dyn_rpc.clone(),
            TagServices::new(dyn_rpc).unwrap(),
        ));
        let mut ctx = Context::default();
        ctx.control = ControlContext::new("192.0.2.10", 443);

        let results = apply_queued(
            orchestrator,
            ctx,
            vec![
                job("first.json", json!({"class": "ADC"})),
                job("second.json", json!(["not", "an", "object"])),
                job("third.json", json!({"class": "ADC"})),
            ],
        )
        .await;

        let names: Vec<_> = results.iter().map(|r| r.bundle.to_string_lossy().to_string()).collect();
        assert_eq!(names, vec!["first.json", "second.json", "third.json"]);
        assert!(results[0].error.is_none());
        assert_eq!(results[1].status_code, Some(400));
        assert!(results[2].report.is_some());
        assert_eq!(rpc.count(Method::Delete, LOCK_PATH), 3);
    }
}
