//! Conversions from Kafka Connect JSON envelopes into typed rows and decoded events.

mod envelope;
pub mod event;
