//! Scripted in-memory device for tests.
//!
//! Replies are registered per `(method, path prefix)`. Queued replies are
//! consumed in order; once a rule's queue is empty its `always` reply (if any)
//! answers every further call. When several rules match, the longest prefix
//! wins. Unmatched calls fail with a 404 status error.

use crate::{ControlContext, CrudeResponse, DeviceRpc, Method, RpcError, RpcReply, RpcRequest, RpcResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A scripted answer.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Status code and body.
    Status { status_code: u16, body: Value },
    /// The request times out.
    Timeout,
    /// Wait, then answer with the inner reply.
    Delayed(Duration, Box<ScriptedReply>),
}

impl ScriptedReply {
    /// 200 with a body.
    pub fn ok(body: Value) -> Self {
        Self::Status {
            status_code: 200,
            body,
        }
    }

    /// Arbitrary status with a body.
    pub fn status(status_code: u16, body: Value) -> Self {
        Self::Status { status_code, body }
    }

    /// Error status whose body carries `message`.
    pub fn error(status_code: u16, message: &str) -> Self {
        Self::Status {
            status_code,
            body: serde_json::json!({ "code": status_code, "message": message }),
        }
    }

    /// Delay this reply.
    pub fn after(self, delay: Duration) -> Self {
        Self::Delayed(delay, Box::new(self))
    }
}

struct Rule {
    method: Method,
    prefix: String,
    queued: VecDeque<ScriptedReply>,
    always: Option<ScriptedReply>,
}

impl Rule {
    fn has_reply(&self) -> bool {
        !self.queued.is_empty() || self.always.is_some()
    }

    fn take(&mut self) -> Option<ScriptedReply> {
        self.queued.pop_front().or_else(|| self.always.clone())
    }
}

/// In-memory [`DeviceRpc`] answering from scripted replies.
#[derive(Default)]
pub struct ScriptedDeviceRpc {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<RpcRequest>>,
}

impl ScriptedDeviceRpc {
    pub fn new() -> Self {
        Self::default()
    }

    fn rule_mut<'a>(rules: &'a mut Vec<Rule>, method: Method, prefix: &str) -> &'a mut Rule {
        let index = match rules
            .iter()
            .position(|rule| rule.method == method && rule.prefix == prefix)
        {
            Some(index) => index,
            None => {
                rules.push(Rule {
                    method,
                    prefix: prefix.to_string(),
                    queued: VecDeque::new(),
                    always: None,
                });
                rules.len() - 1
            }
        };
        &mut rules[index]
    }

    /// Queue one reply for calls matching `method` and `prefix`.
    pub fn on(&self, method: Method, prefix: &str, reply: ScriptedReply) {
        let mut rules = self.rules.lock().unwrap();
        Self::rule_mut(&mut rules, method, prefix)
            .queued
            .push_back(reply);
    }

    /// Reply to every matching call once queued replies are used up.
    pub fn always(&self, method: Method, prefix: &str, reply: ScriptedReply) {
        let mut rules = self.rules.lock().unwrap();
        Self::rule_mut(&mut rules, method, prefix).always = Some(reply);
    }

    /// Every request received, in order.
    pub fn calls(&self) -> Vec<RpcRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Requests matching `method` whose path starts with `prefix`.
    pub fn calls_matching(&self, method: Method, prefix: &str) -> Vec<RpcRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.method == method && call.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of requests matching `method` and `prefix`.
    pub fn count(&self, method: Method, prefix: &str) -> usize {
        self.calls_matching(method, prefix).len()
    }

    fn next_reply(&self, request: &RpcRequest) -> Option<ScriptedReply> {
        let mut rules = self.rules.lock().unwrap();
        rules
            .iter_mut()
            .filter(|rule| {
                rule.method == request.method
                    && request.path.starts_with(&rule.prefix)
                    && rule.has_reply()
            })
            .max_by_key(|rule| rule.prefix.len())
            .and_then(Rule::take)
    }
}

#[async_trait]
impl DeviceRpc for ScriptedDeviceRpc {
    async fn call(&self, control: &ControlContext, request: RpcRequest) -> RpcResult<RpcReply> {
        if !control.is_configured() {
            return Err(RpcError::NotConnected);
        }
        self.calls.lock().unwrap().push(request.clone());

        let mut reply = self.next_reply(&request);
        loop {
            match reply {
                Some(ScriptedReply::Delayed(delay, inner)) => {
                    tokio::time::sleep(delay).await;
                    reply = Some(*inner);
                }
                Some(ScriptedReply::Timeout) => {
                    return Err(RpcError::Timeout(format!("{} {}", request.method, request.path)));
                }
                Some(ScriptedReply::Status { status_code, body }) => {
                    if request.crude {
                        return Ok(RpcReply::Crude(CrudeResponse { status_code, body }));
                    }
                    if !(200..300).contains(&status_code) {
                        let message = crate::request::body_message(&body)
                            .unwrap_or_else(|| format!("status {status_code}"));
                        return Err(RpcError::Status {
                            status_code,
                            message,
                        });
                    }
                    return Ok(RpcReply::Json(body));
                }
                None => {
                    let message = format!("no scripted reply for {} {}", request.method, request.path);
                    if request.crude {
                        return Ok(RpcReply::Crude(CrudeResponse {
                            status_code: 404,
                            body: serde_json::json!({ "code": 404, "message": message }),
                        }));
                    }
                    return Err(RpcError::Status {
                        status_code: 404,
                        message,
                    });
                }
            }
        }
    }
}
