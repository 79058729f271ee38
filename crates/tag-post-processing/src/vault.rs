//! Secret vault implementations.
//!
//! BIG-IP has no direct "encrypt this" endpoint. [`DeviceSecretVault`] creates
//! a throwaway RADIUS server object whose `secret` field the device stores
//! encrypted with its master key, reads the encrypted value back and deletes
//! the object. Long secrets are split into chunks the field accepts and the
//! encrypted chunks are joined with `,`.

use crate::services::SecretVault;
use async_trait::async_trait;
use device_rpc::{ControlContext, DeviceRpc, RpcError, RpcRequest, RpcResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const RADIUS_SERVER_PATH: &str = "/mgmt/tm/auth/radius-server";
const SIMPLE_ENCRYPTER_PATH: &str = "/mgmt/cm/system/simple-encrypter";

/// Largest plaintext chunk the RADIUS secret field accepts.
pub const SECRET_CHUNK_CHARS: usize = 500;

/// BIG-IP vault using the RADIUS server secret field.
pub struct DeviceSecretVault {
    rpc: Arc<dyn DeviceRpc>,
}

impl DeviceSecretVault {
    pub fn new(rpc: Arc<dyn DeviceRpc>) -> Self {
        Self { rpc }
    }

    async fn encrypt_chunk(&self, control: &ControlContext, chunk: &str) -> RpcResult<String> {
        let name = format!("__appsvcs_secret_{}", Uuid::new_v4().simple());
        let created = self
            .rpc
            .call_json(
                control,
                RpcRequest::post(RADIUS_SERVER_PATH, "encrypt secret").with_json(json!({
                    "name": name,
                    "partition": "Common",
                    "server": "192.0.2.1",
                    "secret": chunk,
                })),
            )
            .await?;

        let delete = RpcRequest::delete(
            format!("{RADIUS_SERVER_PATH}/~Common~{name}"),
            "remove secret scratch object",
        );
        if let Err(err) = self.rpc.call_json(control, delete).await {
            warn!(object = %name, error = %err, "Failed to remove secret scratch object");
        }

        created
            .get("secret")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RpcError::UnexpectedResponse("radius-server reply has no secret".to_string()))
    }
}

#[async_trait]
impl SecretVault for DeviceSecretVault {
    async fn encrypt(&self, control: &ControlContext, plaintext: &str) -> RpcResult<String> {
        let chunks = chunk_chars(plaintext, SECRET_CHUNK_CHARS);
        debug!(chunks = chunks.len(), "Encrypting secret on device");

        let mut encrypted = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            encrypted.push(self.encrypt_chunk(control, chunk).await?);
        }
        Ok(encrypted.join(","))
    }
}

/// BIG-IQ remote encryption endpoint.
pub struct RemoteEncrypter {
    rpc: Arc<dyn DeviceRpc>,
}

impl RemoteEncrypter {
    pub fn new(rpc: Arc<dyn DeviceRpc>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl SecretVault for RemoteEncrypter {
    async fn encrypt(&self, control: &ControlContext, plaintext: &str) -> RpcResult<String> {
        let reply = self
            .rpc
            .call_json(
                control,
                RpcRequest::post(SIMPLE_ENCRYPTER_PATH, "encrypt secret remotely")
                    .with_json(json!({ "inputText": plaintext })),
            )
            .await?;

        reply
            .get("encryptedText")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RpcError::UnexpectedResponse("simple-encrypter reply has no encryptedText".to_string()))
    }
}

/// Split on char boundaries into pieces of at most `size` chars.
fn chunk_chars(text: &str, size: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|chunk| chunk.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_rpc::testing::{ScriptedDeviceRpc, ScriptedReply};
    use device_rpc::Method;

    fn control() -> ControlContext {
        ControlContext::new("192.0.2.10", 443)
    }

    #[test]
    fn chunks_respect_char_boundaries() {
        let text = "é".repeat(501);
        let chunks = chunk_chars(&text, SECRET_CHUNK_CHARS);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 500);
        assert_eq!(chunks[1], "é");
    }

    #[tokio::test]
    async fn device_vault_joins_encrypted_chunks() {
        let rpc = Arc::new(ScriptedDeviceRpc::new());
        rpc.on(Method::Post, RADIUS_SERVER_PATH, ScriptedReply::ok(json!({"secret": "$M$one"})));
        rpc.on(Method::Post, RADIUS_SERVER_PATH, ScriptedReply::ok(json!({"secret": "$M$two"})));
        rpc.always(Method::Delete, RADIUS_SERVER_PATH, ScriptedReply::ok(json!({})));

        let vault = DeviceSecretVault::new(rpc.clone());
        let token = vault.encrypt(&control(), &"x".repeat(700)).await.unwrap();

        assert_eq!(token, "$M$one,$M$two");
        assert_eq!(rpc.count(Method::Delete, RADIUS_SERVER_PATH), 2);
    }

    #[tokio::test]
    async fn device_vault_tolerates_cleanup_failure() {
        let rpc = Arc::new(ScriptedDeviceRpc::new());
        rpc.on(Method::Post, RADIUS_SERVER_PATH, ScriptedReply::ok(json!({"secret": "$M$x"})));

        let vault = DeviceSecretVault::new(rpc.clone());
        assert_eq!(vault.encrypt(&control(), "pw").await.unwrap(), "$M$x");
    }

    #[tokio::test]
    async fn remote_encrypter_reads_encrypted_text() {
        let rpc = Arc::new(ScriptedDeviceRpc::new());
        rpc.on(
            Method::Post,
            SIMPLE_ENCRYPTER_PATH,
            ScriptedReply::ok(json!({"encryptedText": "enc-value"})),
        );

        let encrypter = RemoteEncrypter::new(rpc.clone());
        assert_eq!(encrypter.encrypt(&control(), "pw").await.unwrap(), "enc-value");
        assert_eq!(
            rpc.calls()[0].send,
            Some(json!({"inputText": "pw"}))
        );
    }
}
