//! Lock protocol tests against a scripted device.

mod refresh_tests;

use device_rpc::testing::ScriptedDeviceRpc;
use device_rpc::ControlContext;
use request_context::Context;
use std::sync::Arc;

pub(crate) fn setup() -> (Arc<ScriptedDeviceRpc>, Context) {
    let mut ctx = Context::default();
    ctx.control = ControlContext::new("192.0.2.10", 443);
    (Arc::new(ScriptedDeviceRpc::new()), ctx)
}

/// Let spawned tasks run.
pub(crate) async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
