//! Secret and long-secret encryption.
//!
//! A tagged secret is a JOSE-like envelope: `protected` is base64 JSON
//! (`{"alg":"dir","enc":...}`) and `ciphertext` is base64 content. An envelope
//! whose `enc` is anything but `none` is already encrypted and left untouched.

use crate::processors::is_scratch;
use crate::{ProcessError, ProcessResult, TagServices, TagWarning, TagWorkItem};
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use request_context::Context;
use serde_json::{json, Map, Value};
use tracing::{debug, error};

/// Marker for secrets encrypted by a BIG-IP vault.
pub const ENC_DEVICE: &str = "f5sv";
/// Marker for secrets encrypted by a BIG-IQ remote encrypter.
pub const ENC_REMOTE: &str = "f5svbiq";

/// BIG-IQ targets leave long secrets above this many characters for later processing.
pub const LONG_SECRET_REMOTE_LIMIT: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SecretKind {
    Secret,
    LongSecret,
}

impl SecretKind {
    fn tag(self) -> &'static str {
        match self {
            SecretKind::Secret => "secret",
            SecretKind::LongSecret => "longSecret",
        }
    }
}

pub(crate) async fn process(
    kind: SecretKind,
    ctx: &Context,
    services: &TagServices,
    declaration: &mut Value,
    items: &[TagWorkItem],
) -> ProcessResult<Vec<TagWarning>> {
    if items.is_empty() || is_scratch(declaration) {
        return Ok(Vec::new());
    }

    for item in items {
        let Some(envelope) = item.data.as_object() else {
            continue;
        };
        if encryption_marker(envelope).as_deref() != Some("none") {
            continue;
        }

        let plaintext = decode_ciphertext(envelope).ok_or_else(|| {
            ProcessError::validation(&item.instance_path, kind.tag(), "ciphertext is not valid base64 text")
        })?;

        let big_iq = ctx.target.is_big_iq();
        if big_iq && kind == SecretKind::LongSecret && plaintext.chars().count() > LONG_SECRET_REMOTE_LIMIT {
            debug!(path = %item.instance_path, "Leaving long secret for later encryption");
            continue;
        }

        let (vault, marker) = if big_iq {
            (&services.remote_encrypter, ENC_REMOTE)
        } else {
            (&services.vault, ENC_DEVICE)
        };

        let token = match vault.encrypt(&ctx.control, &plaintext).await {
            Ok(token) => token,
            Err(err) if big_iq && kind == SecretKind::Secret => {
                error!(path = %item.instance_path, error = %err, "Secret encryption failed, leaving value unencrypted");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let mut encrypted = envelope.clone();
        encrypted.insert("ciphertext".to_string(), Value::String(STANDARD.encode(token)));
        encrypted.insert("protected".to_string(), Value::String(protected_header(envelope, marker)));
        if let Some(slot) = declaration.pointer_mut(&item.instance_path) {
            *slot = Value::Object(encrypted);
        }
    }

    Ok(Vec::new())
}

/// `enc` of the protected header; a missing header means plaintext.
fn encryption_marker(envelope: &Map<String, Value>) -> Option<String> {
    let Some(protected) = envelope.get("protected").and_then(Value::as_str) else {
        return Some("none".to_string());
    };
    let header: Value = serde_json::from_slice(&decode_base64(protected)?).ok()?;
    header.get("enc").and_then(Value::as_str).map(str::to_string)
}

fn protected_header(envelope: &Map<String, Value>, marker: &str) -> String {
    let mut header = envelope
        .get("protected")
        .and_then(Value::as_str)
        .and_then(decode_base64)
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({ "alg": "dir" }));
    header["enc"] = Value::String(marker.to_string());
    URL_SAFE_NO_PAD.encode(header.to_string())
}

fn decode_ciphertext(envelope: &Map<String, Value>) -> Option<String> {
    let ciphertext = envelope.get("ciphertext").and_then(Value::as_str)?;
    String::from_utf8(decode_base64(ciphertext)?).ok()
}

fn decode_base64(text: &str) -> Option<Vec<u8>> {
    STANDARD
        .decode(text)
        .or_else(|_| URL_SAFE.decode(text))
        .or_else(|_| URL_SAFE_NO_PAD.decode(text))
        .ok()
}
