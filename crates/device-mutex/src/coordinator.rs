//! Acquire/release protocol for the device configuration lock.

use crate::{
    LockMachine, LockMachineInput, LockRefresher, LockState, MutexConfig, MutexError, MutexResult,
};
use device_rpc::{DeviceRpc, RpcError, RpcRequest};
use request_context::Context;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Internal data-group collection holding the lock records.
pub const LOCK_COLLECTION_PATH: &str = "/mgmt/tm/ltm/data-group/internal";
/// Reserved name of the lock record.
pub const LOCK_NAME: &str = "____appsvcs_lock";
/// Item path of the lock record.
pub const LOCK_PATH: &str = "/mgmt/tm/ltm/data-group/internal/~Common~____appsvcs_lock";
/// Reserved name of the marker asking running scripts to stop.
pub const SCRIPTS_STOP_NAME: &str = "____appsvcs_scripts_stop";
/// Item path of the scripts-stop marker.
pub const SCRIPTS_STOP_PATH: &str = "/mgmt/tm/ltm/data-group/internal/~Common~____appsvcs_scripts_stop";

/// Proof of a held lock, owning its refresher.
///
/// Pass it back to [`MutexCoordinator::release`].
#[derive(Debug)]
pub struct LockHandle {
    refresher: LockRefresher,
}

impl LockHandle {
    pub fn refresher(&self) -> &LockRefresher {
        &self.refresher
    }
}

enum CreateOutcome {
    Acquired,
    Exists,
    Failed(String),
}

/// Lock protocol for one request against one device.
pub struct MutexCoordinator {
    rpc: Arc<dyn DeviceRpc>,
    config: MutexConfig,
    fsm: Mutex<LockMachine>,
}

impl MutexCoordinator {
    pub fn new(rpc: Arc<dyn DeviceRpc>) -> Self {
        Self::with_config(rpc, MutexConfig::default())
    }

    pub fn with_config(rpc: Arc<dyn DeviceRpc>, config: MutexConfig) -> Self {
        Self {
            rpc,
            config,
            fsm: Mutex::new(LockMachine::new()),
        }
    }

    pub fn config(&self) -> &MutexConfig {
        &self.config
    }

    pub fn state(&self) -> LockState {
        let fsm = self.fsm.lock().unwrap_or_else(PoisonError::into_inner);
        LockState::from(fsm.state())
    }

    fn transition(&self, input: &LockMachineInput) -> MutexResult<LockState> {
        let mut fsm = self.fsm.lock().unwrap_or_else(PoisonError::into_inner);
        let old_state = LockState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            MutexError::InvalidTransition(format!("cannot apply {:?} in state {:?}", input, old_state))
        })?;

        let new_state = LockState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(old_state = ?old_state, new_state = ?new_state, "Lock state transition");
        }
        Ok(new_state)
    }

    /// Take the device configuration lock.
    ///
    /// Fails with a `mutex_failure` (503) when another request holds a live
    /// lock or the device rejects the create.
    pub async fn acquire(&self, ctx: &Context) -> MutexResult<LockHandle> {
        self.transition(&LockMachineInput::Acquire)?;
        let host = ctx.control.identity();

        match self.create_lock(ctx).await {
            CreateOutcome::Acquired => return self.held(ctx),
            CreateOutcome::Failed(message) => {
                self.transition(&LockMachineInput::Rejected)?;
                return Err(MutexError::Failure(format!(
                    "Failed to acquire configuration lock on device {host}: {message}"
                )));
            }
            CreateOutcome::Exists => {}
        }

        let expired = match self.lock_is_expired(ctx).await {
            Ok(expired) => expired,
            Err(err) => {
                self.transition(&LockMachineInput::Rejected)?;
                return Err(MutexError::Failure(format!(
                    "Failed to read configuration lock on device {host}: {err}"
                )));
            }
        };

        if !expired {
            self.transition(&LockMachineInput::Rejected)?;
            return Err(MutexError::Failure(format!(
                "Configuration operation in progress on device {}, please try again in {} minutes",
                host,
                self.config.retry_minutes(ctx)
            )));
        }

        self.transition(&LockMachineInput::Expired)?;
        info!(host = %host, "Recovering expired configuration lock");
        self.remove_expired_lock(ctx).await;

        match self.create_lock(ctx).await {
            CreateOutcome::Acquired => {
                let handle = self.held(ctx)?;
                self.spawn_scripts_stop_cleanup(ctx);
                Ok(handle)
            }
            CreateOutcome::Exists => {
                self.transition(&LockMachineInput::RecoveryFailed)?;
                Err(MutexError::Failure(format!(
                    "Failed to acquire configuration lock on device {host} after removing an expired lock: lock already exists"
                )))
            }
            CreateOutcome::Failed(message) => {
                self.transition(&LockMachineInput::RecoveryFailed)?;
                Err(MutexError::Failure(format!(
                    "Failed to acquire configuration lock on device {host} after removing an expired lock: {message}"
                )))
            }
        }
    }

    /// Release the lock.
    ///
    /// Stops the refresher before deleting the record. A missing record is
    /// not an error. Without a handle and without a held lock this does
    /// nothing.
    pub async fn release(&self, ctx: &Context, handle: Option<LockHandle>) -> MutexResult<()> {
        let had_handle = handle.is_some();
        if let Some(handle) = handle {
            handle.refresher.stop();
        }

        if self.state() != LockState::Held && !had_handle {
            debug!("No configuration lock to release");
            return Ok(());
        }
        if self.state() == LockState::Held {
            self.transition(&LockMachineInput::Release)?;
        }

        let request = RpcRequest::delete(LOCK_PATH, "release configuration lock").crude();
        match self.rpc.call_crude(&ctx.control, request).await {
            Ok(response) if response.is_success() || response.status_code == 404 => {
                debug!(host = %ctx.control.identity(), "Released configuration lock");
            }
            Ok(response) => {
                warn!(host = %ctx.control.identity(), status = response.status_code, "Failed to delete configuration lock");
            }
            Err(err) => {
                warn!(host = %ctx.control.identity(), error = %err, "Failed to delete configuration lock");
            }
        }

        if self.state() == LockState::Releasing {
            self.transition(&LockMachineInput::Released)?;
        }
        Ok(())
    }

    fn held(&self, ctx: &Context) -> MutexResult<LockHandle> {
        self.transition(&LockMachineInput::Acquired)?;
        info!(host = %ctx.control.identity(), "Acquired configuration lock");
        Ok(LockHandle {
            refresher: LockRefresher::spawn(
                self.rpc.clone(),
                ctx.control.clone(),
                LOCK_PATH.to_string(),
                self.config.refresh_interval,
                ctx.time_slip,
            ),
        })
    }

    async fn create_lock(&self, ctx: &Context) -> CreateOutcome {
        let request = RpcRequest::post(LOCK_COLLECTION_PATH, "acquire configuration lock").with_json(json!({
            "name": LOCK_NAME,
            "partition": "Common",
            "type": "string",
            "description": ctx.device_now_ms().to_string(),
        }));

        match self.rpc.call_crude(&ctx.control, request).await {
            Ok(response) if response.status_code == 200 => CreateOutcome::Acquired,
            Ok(response) if response.status_code == 409 => CreateOutcome::Exists,
            Ok(response) => CreateOutcome::Failed(response.message()),
            Err(err) => CreateOutcome::Failed(err.to_string()),
        }
    }

    async fn lock_is_expired(&self, ctx: &Context) -> Result<bool, RpcError> {
        let record = self
            .rpc
            .call_json(&ctx.control, RpcRequest::get(LOCK_PATH, "read configuration lock"))
            .await?;

        let Some(stamp) = record
            .get("description")
            .and_then(Value::as_str)
            .and_then(|description| description.trim().parse::<i64>().ok())
        else {
            // Unreadable timestamps can never be refreshed by a live holder.
            return Ok(true);
        };

        let age_ms = ctx.device_now_ms() - stamp;
        let window_ms = i64::try_from(self.config.expiry_window(ctx).as_millis()).unwrap_or(i64::MAX);
        debug!(age_ms, window_ms, "Existing configuration lock");
        Ok(age_ms > window_ms)
    }

    async fn remove_expired_lock(&self, ctx: &Context) {
        let stop = RpcRequest::post(LOCK_COLLECTION_PATH, "stop running scripts")
            .with_json(json!({
                "name": SCRIPTS_STOP_NAME,
                "partition": "Common",
                "type": "string",
            }))
            .crude();
        if let Err(err) = self.rpc.call_crude(&ctx.control, stop).await {
            warn!(error = %err, "Failed to request that running scripts stop");
        }

        let delete = RpcRequest::delete(LOCK_PATH, "remove expired configuration lock").crude();
        if let Err(err) = self.rpc.call_crude(&ctx.control, delete).await {
            warn!(error = %err, "Failed to delete expired configuration lock");
        }
    }

    fn spawn_scripts_stop_cleanup(&self, ctx: &Context) {
        let rpc = self.rpc.clone();
        let control = ctx.control.clone();
        tokio::spawn(async move {
            let request = RpcRequest::delete(SCRIPTS_STOP_PATH, "remove scripts-stop marker");
            if let Err(err) = rpc.call_json(&control, request).await {
                warn!(host = %control.identity(), error = %err, "Failed to remove scripts-stop marker");
            }
        });
    }
}
