//! Collaborators the tag processors call out to.

use crate::fetch::{FetchError, FetchSpec, HttpResourceFetcher};
use crate::vault::{DeviceSecretVault, RemoteEncrypter};
use async_trait::async_trait;
use device_rpc::{ControlContext, DeviceRpc, RpcResult};
use std::sync::Arc;

/// Turns plaintext into a device-specific encrypted token.
#[async_trait]
pub trait SecretVault: Send + Sync {
    async fn encrypt(&self, control: &ControlContext, plaintext: &str) -> RpcResult<String>;
}

/// Downloads resources referenced by a declaration.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, spec: &FetchSpec) -> Result<Vec<u8>, FetchError>;
}

/// Everything a dispatch call needs besides the context.
#[derive(Clone)]
pub struct TagServices {
    pub rpc: Arc<dyn DeviceRpc>,
    /// Vault used on BIG-IP-class targets.
    pub vault: Arc<dyn SecretVault>,
    /// Remote encryption used on BIG-IQ-class targets.
    pub remote_encrypter: Arc<dyn SecretVault>,
    pub fetcher: Arc<dyn ResourceFetcher>,
}

impl TagServices {
    /// Default services backed by `rpc`.
    pub fn new(rpc: Arc<dyn DeviceRpc>) -> Result<Self, FetchError> {
        Ok(Self {
            vault: Arc::new(DeviceSecretVault::new(rpc.clone())),
            remote_encrypter: Arc::new(RemoteEncrypter::new(rpc.clone())),
            fetcher: Arc::new(HttpResourceFetcher::new()?),
            rpc,
        })
    }

    pub fn with_vault(mut self, vault: Arc<dyn SecretVault>) -> Self {
        self.vault = vault;
        self
    }

    pub fn with_remote_encrypter(mut self, encrypter: Arc<dyn SecretVault>) -> Self {
        self.remote_encrypter = encrypter;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }
}
