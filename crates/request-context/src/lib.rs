//! Request-scoped context for declaration processing.
//!
//! A [`Context`] is created once per inbound request (or CLI invocation) with
//! safe defaults for every field, mutated while the declaration is processed,
//! and dropped when the request completes. It is never shared between
//! concurrent requests, so it needs no internal locking.

mod context;
mod target;
mod task;
mod version;

pub use context::{Context, ContextError, HostContext, LogContext, RequestContext};
pub use device_rpc::{ControlContext, Credentials};
pub use target::{DeviceType, ProvisionedModule, TargetContext};
pub use task::Task;
pub use version::{compare_versions, version_less_than};
