//! Shared configuration types for the CDC sink.

mod audit;
mod base;
mod retry;
mod sink;

pub use audit::AuditColumnsConfig;
pub use base::ValidationError;
pub use retry::CommitRetryConfig;
pub use sink::{MalformedEventPolicy, SinkConfig};
