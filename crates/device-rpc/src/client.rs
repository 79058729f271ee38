//! Device RPC trait and its reqwest transport.

use crate::request::{body_message, parse_body};
use crate::{ControlContext, CrudeResponse, Method, RpcError, RpcReply, RpcRequest, RpcResult};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Authenticated request/response calls against a target device.
#[async_trait]
pub trait DeviceRpc: Send + Sync {
    /// Issue one call against the device described by `control`.
    async fn call(&self, control: &ControlContext, request: RpcRequest) -> RpcResult<RpcReply>;

    /// Issue a call and return its parsed JSON body.
    async fn call_json(&self, control: &ControlContext, request: RpcRequest) -> RpcResult<Value> {
        let request = RpcRequest {
            crude: false,
            ..request
        };
        Ok(self.call(control, request).await?.into_json())
    }

    /// Issue a call and return its status and body whatever the status.
    async fn call_crude(
        &self,
        control: &ControlContext,
        request: RpcRequest,
    ) -> RpcResult<CrudeResponse> {
        self.call(control, request.crude()).await?.into_crude()
    }
}

/// reqwest-backed [`DeviceRpc`].
#[derive(Clone)]
pub struct HttpDeviceRpc {
    http_client: reqwest::Client,
    default_timeout: Duration,
}

impl HttpDeviceRpc {
    /// Create a transport.
    ///
    /// Management interfaces commonly present self-signed certificates, so
    /// `accept_invalid_certs` is usually true for device targets.
    pub fn new(accept_invalid_certs: bool) -> RpcResult<Self> {
        let http_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self {
            http_client,
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Override the default per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    fn classify(err: reqwest::Error, request: &RpcRequest) -> RpcError {
        if err.is_timeout() {
            RpcError::Timeout(format!("{} {}", request.method, request.path))
        } else {
            RpcError::Http(err)
        }
    }
}

#[async_trait]
impl DeviceRpc for HttpDeviceRpc {
    async fn call(&self, control: &ControlContext, request: RpcRequest) -> RpcResult<RpcReply> {
        if !control.is_configured() {
            return Err(RpcError::NotConnected);
        }

        let url = control.url(&request.path);
        debug!(method = %request.method, path = %request.path, why = %request.why, "Device RPC call");

        let mut builder = self
            .http_client
            .request(Self::method(request.method), &url)
            .timeout(control.timeout.unwrap_or(self.default_timeout));

        builder = match (&control.token, &control.credentials) {
            (Some(token), _) => builder.header("X-F5-Auth-Token", token),
            (None, Some(creds)) => builder.basic_auth(&creds.username, Some(&creds.password)),
            (None, None) => builder,
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(raw) = &request.raw {
            let ctype = request
                .ctype
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string());
            builder = builder.header("Content-Type", ctype).body(raw.clone());
        } else if let Some(send) = &request.send {
            if request.sends_json() {
                builder = builder.json(send);
            } else if let Value::String(text) = send {
                let ctype = request.ctype.clone().unwrap_or_else(|| "text/plain".to_string());
                builder = builder.header("Content-Type", ctype).body(text.clone());
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|err| Self::classify(err, &request))?;
        let status_code = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|err| Self::classify(err, &request))?;
        let body = parse_body(&text);

        if request.crude {
            return Ok(RpcReply::Crude(CrudeResponse { status_code, body }));
        }

        if !(200..300).contains(&status_code) {
            let message = body_message(&body).unwrap_or_else(|| {
                format!("{} {} failed with status {}", request.method, request.path, status_code)
            });
            warn!(status = status_code, path = %request.path, why = %request.why, "Device RPC call failed");
            return Err(RpcError::Status {
                status_code,
                message,
            });
        }

        Ok(RpcReply::Json(body))
    }
}
