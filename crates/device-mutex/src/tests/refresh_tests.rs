use super::{settle, setup};
use crate::{MutexConfig, MutexCoordinator, LOCK_COLLECTION_PATH, LOCK_PATH};
use device_rpc::testing::ScriptedReply;
use device_rpc::Method;
use serde_json::json;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn refresher_patches_until_released() {
    let (rpc, ctx) = setup();
    rpc.on(Method::Post, LOCK_COLLECTION_PATH, ScriptedReply::ok(json!({})));
    rpc.always(Method::Patch, LOCK_PATH, ScriptedReply::ok(json!({})));
    let coordinator = MutexCoordinator::new(rpc.clone());

    let handle = coordinator.acquire(&ctx).await.unwrap();
    settle().await;
    assert_eq!(rpc.count(Method::Patch, LOCK_PATH), 0);

    tokio::time::advance(Duration::from_secs(90)).await;
    settle().await;
    assert_eq!(rpc.count(Method::Patch, LOCK_PATH), 1);

    tokio::time::advance(Duration::from_secs(90)).await;
    settle().await;
    assert_eq!(rpc.count(Method::Patch, LOCK_PATH), 2);
    let patch = rpc.calls_matching(Method::Patch, LOCK_PATH).remove(0);
    assert!(patch.send.unwrap()["description"].as_str().unwrap().parse::<i64>().is_ok());

    coordinator.release(&ctx, Some(handle)).await.unwrap();
    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(90)).await;
        settle().await;
    }
    assert_eq!(rpc.count(Method::Patch, LOCK_PATH), 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_interval_is_configurable() {
    let (rpc, ctx) = setup();
    rpc.on(Method::Post, LOCK_COLLECTION_PATH, ScriptedReply::ok(json!({})));
    rpc.always(Method::Patch, LOCK_PATH, ScriptedReply::ok(json!({})));
    let coordinator = MutexCoordinator::with_config(
        rpc.clone(),
        MutexConfig {
            refresh_interval: Duration::from_secs(10),
            ..MutexConfig::default()
        },
    );

    let handle = coordinator.acquire(&ctx).await.unwrap();
    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(rpc.count(Method::Patch, LOCK_PATH), 1);

    // Dropping the handle also stops refreshing.
    drop(handle);
    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(rpc.count(Method::Patch, LOCK_PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_failures_do_not_stop_refresher() {
    let (rpc, ctx) = setup();
    rpc.on(Method::Post, LOCK_COLLECTION_PATH, ScriptedReply::ok(json!({})));
    rpc.on(Method::Patch, LOCK_PATH, ScriptedReply::error(500, "busy"));
    rpc.always(Method::Patch, LOCK_PATH, ScriptedReply::ok(json!({})));
    let coordinator = MutexCoordinator::new(rpc.clone());

    let handle = coordinator.acquire(&ctx).await.unwrap();
    for _ in 0..2 {
        tokio::time::advance(Duration::from_secs(90)).await;
        settle().await;
    }
    assert_eq!(rpc.count(Method::Patch, LOCK_PATH), 2);
    assert!(handle.refresher().is_running());
    coordinator.release(&ctx, Some(handle)).await.unwrap();
}
