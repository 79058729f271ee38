//! Shared fixtures: a scripted device, recording vaults and a static fetcher.

use crate::fetch::{FetchError, FetchSpec};
use crate::{ResourceFetcher, SecretVault, TagServices};
use async_trait::async_trait;
use device_rpc::testing::ScriptedDeviceRpc;
use device_rpc::{ControlContext, RpcError, RpcResult};
use request_context::Context;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Vault that returns `token` and remembers what it encrypted.
pub(crate) struct RecordingVault {
    token: String,
    fail: bool,
    plaintexts: Mutex<Vec<String>>,
}

impl RecordingVault {
    pub(crate) fn returning(token: &str) -> Self {
        Self {
            token: token.to_string(),
            fail: false,
            plaintexts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::returning("")
        }
    }

    pub(crate) fn plaintexts(&self) -> Vec<String> {
        self.plaintexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecretVault for RecordingVault {
    async fn encrypt(&self, _control: &ControlContext, plaintext: &str) -> RpcResult<String> {
        self.plaintexts.lock().unwrap().push(plaintext.to_string());
        if self.fail {
            return Err(RpcError::Status {
                status_code: 500,
                message: "encryption service unavailable".to_string(),
            });
        }
        Ok(self.token.clone())
    }
}

/// Fetcher serving fixed bodies by URL; unknown URLs are 404.
#[derive(Default)]
pub(crate) struct StaticFetcher {
    bodies: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    pub(crate) fn with(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies.insert(url.to_string(), body.to_vec());
        self
    }
}

#[async_trait]
impl ResourceFetcher for StaticFetcher {
    async fn fetch(&self, spec: &FetchSpec) -> Result<Vec<u8>, FetchError> {
        self.bodies.get(&spec.url).cloned().ok_or_else(|| FetchError::Status {
            url: spec.url.clone(),
            status: 404,
        })
    }
}

pub(crate) struct ScriptedSetup {
    pub(crate) rpc: Arc<ScriptedDeviceRpc>,
    pub(crate) vault: Arc<RecordingVault>,
    pub(crate) remote: Arc<RecordingVault>,
    pub(crate) fetcher: Arc<StaticFetcher>,
}

impl ScriptedSetup {
    pub(crate) fn new() -> Self {
        Self {
            rpc: Arc::new(ScriptedDeviceRpc::new()),
            vault: Arc::new(RecordingVault::returning("$M$device-token")),
            remote: Arc::new(RecordingVault::returning("remote-token")),
            fetcher: Arc::new(StaticFetcher::default()),
        }
    }

    pub(crate) fn with_remote(mut self, remote: RecordingVault) -> Self {
        self.remote = Arc::new(remote);
        self
    }

    pub(crate) fn with_fetcher(mut self, fetcher: StaticFetcher) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    /// Context aimed at a remote BIG-IP.
    pub(crate) fn context(&self) -> Context {
        let mut ctx = Context::default();
        ctx.target.host = "192.0.2.10".to_string();
        ctx.target.port = 443;
        ctx.target.tmos_version = "15.1.0".to_string();
        ctx.control = ControlContext::new("192.0.2.10", 443);
        ctx
    }
}

pub(crate) fn services(setup: &ScriptedSetup) -> TagServices {
    TagServices {
        rpc: setup.rpc.clone(),
        vault: setup.vault.clone(),
        remote_encrypter: setup.remote.clone(),
        fetcher: setup.fetcher.clone(),
    }
}
