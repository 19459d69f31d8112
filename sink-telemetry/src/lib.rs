//! Logging and metrics setup for processes embedding the CDC sink.

pub mod metrics;
pub mod tracing;
