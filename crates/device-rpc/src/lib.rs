//! Device RPC: the only way orchestrator components talk to a target device.
//!
//! A call takes a [`RpcRequest`] (`path`, `method`, `why`, optional body,
//! content type and the `crude` flag) plus the active [`ControlContext`] and
//! returns either the parsed JSON body or, for crude requests, the raw status
//! and body regardless of status code. Failures are typed [`RpcError`]s that
//! carry a status code and message.
//!
//! Components depend on the [`DeviceRpc`] trait only. [`HttpDeviceRpc`] is the
//! reqwest-backed transport; the `testing` feature adds `ScriptedDeviceRpc`,
//! an in-memory device with queued replies.

mod client;
mod control;
mod error;
mod file_transfer;
mod request;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{DeviceRpc, HttpDeviceRpc};
pub use control::{ControlContext, Credentials};
pub use error::{RpcError, RpcResult};
pub use file_transfer::{
    copy_to_host, upload_bytes, DOWNLOADS_DIR, UPLOAD_CHUNK_SIZE, UPLOAD_PATH_PREFIX,
};
pub use request::{CrudeResponse, Method, RpcReply, RpcRequest};
