//! Background refresh of a held lock.

use device_rpc::{ControlContext, DeviceRpc, RpcRequest};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Keeps a held lock fresh until stopped.
///
/// The refresh task is aborted when the handle is stopped or dropped, so a
/// lock handle can never leave a timer behind.
#[derive(Debug)]
pub struct LockRefresher {
    handle: JoinHandle<()>,
}

impl LockRefresher {
    pub(crate) fn spawn(
        rpc: Arc<dyn DeviceRpc>,
        control: ControlContext,
        lock_path: String,
        interval: Duration,
        time_slip: i64,
    ) -> Self {
        // Schedule from acquisition time.
        let start = Instant::now() + interval;
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let now = chrono::Utc::now().timestamp_millis() + time_slip;
                let request = RpcRequest::patch(&lock_path, "refresh configuration lock")
                    .with_json(json!({ "description": now.to_string() }));
                match rpc.call_json(&control, request).await {
                    Ok(_) => debug!(host = %control.identity(), "Refreshed configuration lock"),
                    Err(err) => warn!(host = %control.identity(), error = %err, "Failed to refresh configuration lock"),
                }
            }
        });
        Self { handle }
    }

    /// Whether the refresh task is still scheduled.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop refreshing.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for LockRefresher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
