//! The per-request [`Context`] and its process/request/log sub-records.

use crate::{Task, TargetContext};
use appsvcs_config_and_utils::{Settings, SettingsStore};
use device_rpc::{ControlContext, Credentials};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by context accessors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("no current task (index {index} of {len})")]
    NoCurrentTask { index: usize, len: usize },
}

/// Device-independent process state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostContext {
    /// Version of this service.
    pub version: String,
    /// Whether the Service Discovery component is installed; `None` when unknown.
    pub service_discovery_installed: Option<bool>,
}

impl Default for HostContext {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            service_discovery_installed: None,
        }
    }
}

/// Inbound request metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub id: Uuid,
    /// Inbound method (`POST`, `GET`, ...).
    pub method: String,
    /// Timeout the caller declared for the whole request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            method: "POST".to_string(),
            timeout: None,
            credentials: None,
            token: None,
        }
    }
}

/// Trace-file bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogContext {
    /// Write the rendered update script to `trace_file`.
    pub trace: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_file: Option<PathBuf>,
}

/// State threaded through every operation of one request.
#[derive(Debug, Clone)]
pub struct Context {
    pub host: HostContext,
    pub request: RequestContext,
    pub target: TargetContext,
    pub tasks: Vec<Task>,
    pub current_index: usize,
    /// Connection used for every device RPC call; populated before the first call.
    pub control: ControlContext,
    pub log: LogContext,
    /// Milliseconds to add to the local clock to get device time.
    pub time_slip: i64,
    pub settings: SettingsStore,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(SettingsStore::new(Settings::default()))
    }
}

impl Context {
    /// Context with one default task and an unconfigured control.
    pub fn new(settings: SettingsStore) -> Self {
        Self {
            host: HostContext::default(),
            request: RequestContext::default(),
            target: TargetContext::default(),
            tasks: vec![Task::new()],
            current_index: 0,
            control: ControlContext::default(),
            log: LogContext::default(),
            time_slip: 0,
            settings,
        }
    }

    /// Context aimed at `host:port` with basic-auth credentials.
    pub fn for_target(
        settings: SettingsStore,
        host: impl Into<String>,
        port: u16,
        credentials: Credentials,
    ) -> Self {
        let host = host.into();
        let mut ctx = Self::new(settings);
        ctx.target.host = host.clone();
        ctx.target.port = port;
        ctx.request.credentials = Some(credentials.clone());
        ctx.control = ControlContext {
            credentials: Some(credentials),
            ..ControlContext::new(host, port)
        };
        ctx
    }

    pub fn current_task(&self) -> Result<&Task, ContextError> {
        let len = self.tasks.len();
        self.tasks
            .get(self.current_index)
            .ok_or(ContextError::NoCurrentTask {
                index: self.current_index,
                len,
            })
    }

    pub fn current_task_mut(&mut self) -> Result<&mut Task, ContextError> {
        let len = self.tasks.len();
        let index = self.current_index;
        self.tasks
            .get_mut(index)
            .ok_or(ContextError::NoCurrentTask { index, len })
    }

    /// Make `index` the current task and point `control` at its connection.
    pub fn activate_task(&mut self, index: usize) -> Result<(), ContextError> {
        let len = self.tasks.len();
        let task = self
            .tasks
            .get(index)
            .ok_or(ContextError::NoCurrentTask { index, len })?;

        self.control.protocol = task.protocol.clone();
        self.control.url_prefix = task.url_prefix.clone();
        if self.control.host.is_empty() {
            self.control.host = self.target.host.clone();
            self.control.port = self.target.port;
        }
        if self.control.token.is_none() {
            self.control.token = self.target.token.clone();
        }
        self.current_index = index;
        Ok(())
    }

    /// Whether the current task is a dry run.
    pub fn is_dry_run(&self) -> bool {
        self.current_task().map(|task| task.dry_run).unwrap_or(false)
    }

    /// Device clock in epoch milliseconds.
    pub fn device_now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis() + self.time_slip
    }
}
