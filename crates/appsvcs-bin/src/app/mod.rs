//! Application wiring: bundles, target discovery and the apply pipeline.

mod bundle;
mod discovery;
mod error;
mod orchestrator;
mod run;
mod target;

pub use run::{run_apply, run_upload, ApplyOptions};
pub use target::DeviceTarget;
