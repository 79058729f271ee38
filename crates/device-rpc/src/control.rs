//! Active device connection parameters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Username/password pair for basic authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Parse `user:pass`. The password may itself contain `:`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (username, password) = raw.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection parameters used for every device RPC call of a task.
///
/// Must be populated (host or url prefix) before any call is made.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlContext {
    /// `https` unless the task says otherwise.
    pub protocol: String,
    /// Device host name or address.
    pub host: String,
    /// Management port.
    pub port: u16,
    /// Full URL prefix (e.g. `https://10.0.0.1:8443`); overrides protocol/host/port.
    #[serde(default)]
    pub url_prefix: String,
    /// Basic-auth credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    /// Auth token, preferred over credentials when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Per-request timeout override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl ControlContext {
    /// Control for `https://host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: "https".to_string(),
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Whether enough is known to reach a device.
    pub fn is_configured(&self) -> bool {
        !self.url_prefix.is_empty() || !self.host.is_empty()
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> String {
        if !self.url_prefix.is_empty() {
            return self.url_prefix.trim_end_matches('/').to_string();
        }
        let protocol = if self.protocol.is_empty() {
            "https"
        } else {
            self.protocol.as_str()
        };
        format!("{}://{}:{}", protocol, self.host, self.port)
    }

    /// Absolute URL for a device path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Human-readable device identity for messages.
    pub fn identity(&self) -> String {
        if self.host.is_empty() {
            self.base_url()
        } else {
            self.host.clone()
        }
    }
}
