//! Behavioural tests for tag post-processing.

pub(crate) mod harness;

mod big_component_tests;
