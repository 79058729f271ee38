//! Request and reply types for device RPC calls.

use crate::{RpcError, RpcResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP-like method of a device RPC call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Uppercase method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One device RPC call.
///
/// Deserializable so callers can ship lists of calls (for example the
/// pre-script uploads of an update payload) as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Path on the device management API, starting with `/`.
    pub path: String,
    /// Method of the call.
    #[serde(default)]
    pub method: Method,
    /// Human-readable reason, used in logs and error messages.
    #[serde(default)]
    pub why: String,
    /// Body to send. Strings are sent verbatim when `ctype` is not JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send: Option<Value>,
    /// Content type of the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctype: Option<String>,
    /// Return status and body for any status code instead of failing on non-2xx.
    #[serde(default)]
    pub crude: bool,
    /// Extra request headers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    /// Raw body bytes (uploads). Takes precedence over `send`.
    #[serde(skip)]
    pub raw: Option<Vec<u8>>,
}

impl RpcRequest {
    /// New request with the given method and path.
    pub fn new(method: Method, path: impl Into<String>, why: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            why: why.into(),
            send: None,
            ctype: None,
            crude: false,
            headers: Vec::new(),
            raw: None,
        }
    }

    pub fn get(path: impl Into<String>, why: impl Into<String>) -> Self {
        Self::new(Method::Get, path, why)
    }

    pub fn post(path: impl Into<String>, why: impl Into<String>) -> Self {
        Self::new(Method::Post, path, why)
    }

    pub fn put(path: impl Into<String>, why: impl Into<String>) -> Self {
        Self::new(Method::Put, path, why)
    }

    pub fn patch(path: impl Into<String>, why: impl Into<String>) -> Self {
        Self::new(Method::Patch, path, why)
    }

    pub fn delete(path: impl Into<String>, why: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, why)
    }

    /// Attach a JSON body.
    pub fn with_json(mut self, body: Value) -> Self {
        self.send = Some(body);
        self
    }

    /// Attach raw bytes with a content type.
    pub fn with_raw(mut self, body: Vec<u8>, ctype: impl Into<String>) -> Self {
        self.raw = Some(body);
        self.ctype = Some(ctype.into());
        self
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Ask for the raw status and body instead of failing on non-2xx.
    pub fn crude(mut self) -> Self {
        self.crude = true;
        self
    }

    /// Whether the body should be encoded as JSON.
    pub fn sends_json(&self) -> bool {
        match (&self.send, self.ctype.as_deref()) {
            (Some(Value::String(_)), Some(ctype)) => ctype.contains("json"),
            (Some(_), _) => true,
            (None, _) => false,
        }
    }
}

/// Raw response of a crude call.
#[derive(Debug, Clone, PartialEq)]
pub struct CrudeResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Parsed JSON body, a JSON string for non-JSON bodies, or null when empty.
    pub body: Value,
}

impl CrudeResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// `message` field of a JSON error body, or the body text.
    pub fn message(&self) -> String {
        body_message(&self.body).unwrap_or_else(|| format!("status {}", self.status_code))
    }
}

/// Reply of a device RPC call.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply {
    /// Parsed body of a successful non-crude call.
    Json(Value),
    /// Status and body of a crude call.
    Crude(CrudeResponse),
}

impl RpcReply {
    /// Body of the reply, for either variant.
    pub fn into_json(self) -> Value {
        match self {
            RpcReply::Json(body) => body,
            RpcReply::Crude(response) => response.body,
        }
    }

    /// Crude response, or an error when the call was not crude.
    pub fn into_crude(self) -> RpcResult<CrudeResponse> {
        match self {
            RpcReply::Crude(response) => Ok(response),
            RpcReply::Json(_) => Err(RpcError::UnexpectedResponse(
                "expected a crude response".to_string(),
            )),
        }
    }
}

/// Extract a device error message from a response body.
pub(crate) fn body_message(body: &Value) -> Option<String> {
    match body {
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

/// Parse a response body: JSON when possible, else a JSON string.
pub(crate) fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
