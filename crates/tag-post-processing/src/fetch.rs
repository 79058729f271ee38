//! Downloading resources referenced by a declaration.

use crate::services::ResourceFetcher;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Where to download a resource from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchSpec {
    pub url: String,
    #[serde(default)]
    pub skip_certificate_check: bool,
}

impl FetchSpec {
    /// Parse the tagged `url` property: a string, or `{url, skipCertificateCheck}`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(url) => Some(Self {
                url: url.clone(),
                skip_certificate_check: false,
            }),
            Value::Object(_) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// reqwest-backed [`ResourceFetcher`].
pub struct HttpResourceFetcher {
    strict: reqwest::Client,
    insecure: reqwest::Client,
}

impl HttpResourceFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            strict: reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?,
            insecure: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .danger_accept_invalid_certs(true)
                .build()?,
        })
    }
}

#[async_trait]
impl ResourceFetcher for HttpResourceFetcher {
    async fn fetch(&self, spec: &FetchSpec) -> Result<Vec<u8>, FetchError> {
        let client = if spec.skip_certificate_check {
            &self.insecure
        } else {
            &self.strict
        };
        debug!(url = %spec.url, "Fetching declaration resource");

        let response = client.get(&spec.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: spec.url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_from_string_and_object() {
        assert_eq!(
            FetchSpec::from_value(&json!("https://example.com/a.xml")),
            Some(FetchSpec {
                url: "https://example.com/a.xml".to_string(),
                skip_certificate_check: false
            })
        );
        let spec = FetchSpec::from_value(&json!({"url": "https://x", "skipCertificateCheck": true})).unwrap();
        assert!(spec.skip_certificate_check);
        assert!(FetchSpec::from_value(&json!(42)).is_none());
    }
}
