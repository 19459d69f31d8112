//! CDC upsert sink.
//!
//! Consumes batches of Debezium style change events and applies them to a key-addressable table
//! store, so that each destination table reflects the latest state of its source table.
//!
//! Within a batch, events for the same key are reduced to one winner by source timestamp, then
//! operation priority (`create < read < update < delete`), then arrival order. Winners are
//! partitioned into upserts and deletes and committed atomically per table. The result does not
//! depend on the order events are processed in, and redelivering a batch leaves the tables
//! unchanged.
//!
//! The entry point is [`sink::Sink::handle_batch`].

pub mod apply;
pub mod conversions;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
mod macros;
pub mod metrics;
pub mod report;
pub mod sink;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
