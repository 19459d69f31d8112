use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{AuditColumnsConfig, CommitRetryConfig, ValidationError};

/// What the sink does with an event it cannot decode.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MalformedEventPolicy {
    /// Reject the whole batch: nothing is committed and the batch is not acknowledged.
    #[default]
    FailBatch,
    /// Drop the offending event and apply the rest of the batch.
    SkipEvent,
}

/// Configuration of the CDC sink.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct SinkConfig {
    /// Prefix prepended to every destination table name.
    #[serde(default)]
    pub table_prefix: String,
    /// Replace `.` in event destinations with `_` when naming destination tables.
    #[serde(default = "default_flatten_destination")]
    pub flatten_destination: bool,
    /// Keep the last image of deleted rows (with the deletion flag set) instead of removing them.
    #[serde(default)]
    pub keep_deletes: bool,
    /// Allow new nullable columns to be added to an existing table.
    #[serde(default = "default_allow_field_addition")]
    pub allow_field_addition: bool,
    /// Handling of events that cannot be decoded.
    #[serde(default)]
    pub malformed_event_policy: MalformedEventPolicy,
    /// Maximum number of destination tables committed concurrently within one batch.
    #[serde(default = "default_max_concurrent_tables")]
    pub max_concurrent_tables: usize,
    /// Audit column names.
    #[serde(default)]
    pub audit_columns: AuditColumnsConfig,
    /// Retry behavior for transient table store failures.
    #[serde(default)]
    pub commit_retry: CommitRetryConfig,
}

impl SinkConfig {
    pub const DEFAULT_MAX_CONCURRENT_TABLES: usize = 8;

    /// Upper bound of `max_concurrent_tables`, the largest permit count of a tokio semaphore.
    pub const MAX_CONCURRENT_TABLES_LIMIT: usize = usize::MAX >> 3;

    /// Validates the sink configuration and every nested section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_concurrent_tables == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "max_concurrent_tables".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.max_concurrent_tables > Self::MAX_CONCURRENT_TABLES_LIMIT {
            return Err(ValidationError::InvalidFieldValue {
                field: "max_concurrent_tables".to_string(),
                constraint: format!("must not exceed {}", Self::MAX_CONCURRENT_TABLES_LIMIT),
            });
        }

        self.audit_columns.validate()?;
        self.commit_retry.validate()?;

        Ok(())
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            flatten_destination: default_flatten_destination(),
            keep_deletes: false,
            allow_field_addition: default_allow_field_addition(),
            malformed_event_policy: MalformedEventPolicy::default(),
            max_concurrent_tables: default_max_concurrent_tables(),
            audit_columns: AuditColumnsConfig::default(),
            commit_retry: CommitRetryConfig::default(),
        }
    }
}

impl Config for SinkConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

fn default_flatten_destination() -> bool {
    true
}

fn default_allow_field_addition() -> bool {
    true
}

fn default_max_concurrent_tables() -> usize {
    SinkConfig::DEFAULT_MAX_CONCURRENT_TABLES
}
