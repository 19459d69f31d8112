//! Utilities for testing the sink.
//!
//! - [`event`] builds Debezium style change events and already decoded events.
//! - [`store`] wraps a [`crate::store::TableStore`] to inject commit failures and panics.
//! - [`committer`] records the batch reports it is asked to acknowledge.
//! - [`failpoints`] configures `fail` failpoints for the duration of a test.

pub mod committer;
pub mod event;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod store;
