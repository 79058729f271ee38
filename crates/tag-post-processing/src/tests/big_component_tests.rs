use super::harness::{services, ScriptedSetup};
use crate::{process, ProcessError, ProcessOptions, TagRecord};
use device_rpc::testing::ScriptedReply;
use device_rpc::Method;
use serde_json::{json, Value};

const MONITOR_HTTP: &str = "/mgmt/tm/ltm/monitor/http";
const MONITOR_HTTPS: &str = "/mgmt/tm/ltm/monitor/https";

fn declaration() -> Value {
    json!({
        "class": "ADC",
        "T": {
            "class": "Tenant",
            "A": {
                "class": "Application",
                "pool1": {"class": "Pool", "monitors": [{"bigip": "/Common/mon"}]},
                "pool2": {"class": "Pool", "monitors": [{"bigip": "/Common/mon"}]},
                "vs": {
                    "class": "Service_HTTP",
                    "virtualAddresses": [{"bigip": "/Common/va1"}],
                    "policyWAF": {"bigip": "/Common/my policy"},
                    "policyIAM": {"bigip": "/Common/other"}
                }
            }
        }
    })
}

async fn run(setup: &ScriptedSetup, records: &[TagRecord]) -> (crate::ProcessResult<crate::ProcessOutcome>, request_context::Context) {
    let mut ctx = setup.context();
    let mut decl = declaration();
    let original = decl.clone();
    let result = process(&mut ctx, &services(setup), &mut decl, &original, records, &ProcessOptions::default()).await;
    (result, ctx)
}

#[tokio::test]
async fn conflict_means_exists() {
    let setup = ScriptedSetup::new();
    setup.rpc.on(Method::Post, MONITOR_HTTP, ScriptedReply::error(409, "already exists"));

    let records = [TagRecord::new("bigComponent", "/T/A/pool1/monitors/0", json!("ltm monitor http"))];
    let (result, _) = run(&setup, &records).await;

    result.unwrap();
    assert_eq!(
        setup.rpc.calls()[0].send,
        Some(json!({"name": "mon", "partition": "Common"}))
    );
}

#[tokio::test]
async fn accidental_create_is_rolled_back_and_rejected() {
    let setup = ScriptedSetup::new();
    setup.rpc.on(Method::Post, MONITOR_HTTP, ScriptedReply::ok(json!({"name": "mon"})));
    setup.rpc.on(Method::Delete, MONITOR_HTTP, ScriptedReply::ok(json!({})));

    let records = [TagRecord::new("bigComponent", "/T/A/pool1/monitors/0", json!("ltm monitor http"))];
    let (result, _) = run(&setup, &records).await;

    let err = result.unwrap_err();
    assert_eq!(err.as_validation().unwrap().keyword, "bigComponent");
    assert!(err.to_string().contains("/Common/mon does not exist"));
    let deletes = setup.rpc.calls_matching(Method::Delete, MONITOR_HTTP);
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].path, "/mgmt/tm/ltm/monitor/http/~Common~mon");
}

#[tokio::test]
async fn identical_checks_are_issued_once() {
    let setup = ScriptedSetup::new();
    setup.rpc.always(Method::Post, MONITOR_HTTP, ScriptedReply::error(409, "already exists"));

    let records = [
        TagRecord::new("bigComponent", "/T/A/pool1/monitors/0", json!("ltm monitor http")),
        TagRecord::new("bigComponent", "/T/A/pool2/monitors/0", json!("ltm monitor http")),
    ];
    let (result, _) = run(&setup, &records).await;

    result.unwrap();
    assert_eq!(setup.rpc.count(Method::Post, MONITOR_HTTP), 1);
}

#[tokio::test]
async fn any_candidate_type_may_succeed() {
    let setup = ScriptedSetup::new();
    setup.rpc.on(Method::Post, MONITOR_HTTP, ScriptedReply::error(404, "not found"));
    setup.rpc.on(Method::Post, MONITOR_HTTPS, ScriptedReply::error(409, "already exists"));

    let records = [TagRecord::new(
        "bigComponent",
        "/T/A/pool1/monitors/0",
        json!(["ltm monitor http", "ltm monitor https"]),
    )];
    let (result, _) = run(&setup, &records).await;
    result.unwrap();
}

#[tokio::test]
async fn device_failure_on_every_candidate_is_transport_error() {
    let setup = ScriptedSetup::new();
    setup.rpc.on(Method::Post, MONITOR_HTTP, ScriptedReply::error(503, "busy"));

    let records = [TagRecord::new("bigComponent", "/T/A/pool1/monitors/0", json!("ltm monitor http"))];
    let (result, _) = run(&setup, &records).await;

    let err = result.unwrap_err();
    assert!(matches!(err, ProcessError::Transport(_)));
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn virtual_address_read_records_mask() {
    let setup = ScriptedSetup::new();
    setup.rpc.on(
        Method::Get,
        "/mgmt/tm/ltm/virtual-address/~Common~va1",
        ScriptedReply::ok(json!({"name": "va1", "address": "10.0.0.5", "mask": "255.255.255.255"})),
    );

    let records = [TagRecord::new(
        "bigComponent",
        "/T/A/vs/virtualAddresses/0",
        json!("ltm virtual-address"),
    )];
    let (result, ctx) = run(&setup, &records).await;

    result.unwrap();
    assert_eq!(
        ctx.current_task().unwrap().metadata_for("/T/A/vs/virtualAddresses/0"),
        Some(&json!({"mask": "255.255.255.255", "address": "10.0.0.5"}))
    );
}

#[tokio::test]
async fn asm_policies_listed_once_and_matched_by_full_path() {
    let setup = ScriptedSetup::new();
    setup.rpc.on(
        Method::Get,
        "/mgmt/tm/asm/policies",
        ScriptedReply::ok(json!({"items": [
            {"name": "my policy", "fullPath": "/Common/\"my policy\""},
            {"name": "other", "fullPath": "/Common/other"}
        ]})),
    );

    let records = [
        TagRecord::new("bigComponent", "/T/A/vs/policyWAF", json!("asm policy")),
        TagRecord::new("bigComponent", "/T/A/vs/policyIAM", json!("asm policy")),
    ];
    let (result, _) = run(&setup, &records).await;

    result.unwrap();
    assert_eq!(setup.rpc.count(Method::Get, "/mgmt/tm/asm/policies"), 1);
}

#[tokio::test]
async fn missing_asm_policy_is_rejected() {
    let setup = ScriptedSetup::new();
    setup.rpc.on(Method::Get, "/mgmt/tm/asm/policies", ScriptedReply::ok(json!({"items": []})));

    let records = [TagRecord::new("bigComponent", "/T/A/vs/policyIAM", json!("asm policy"))];
    let (result, _) = run(&setup, &records).await;

    assert_eq!(result.unwrap_err().status_code(), 422);
}
