//! Single-reader work queue.
//!
//! This crate provides:
//! - WorkQueue: FIFO queue with one outstanding consumer at a time
//! - delegate: an always-on worker loop applying a callback to each item

mod error;
mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::WorkQueue;
