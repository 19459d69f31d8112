use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Names of the audit columns embedded in every change event payload.
///
/// The values of these columns are written to the destination table untouched. The sink only
/// reads the operation, logical timestamp and deletion flag columns to resolve conflicts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AuditColumnsConfig {
    /// Column holding the operation code (`c`, `r`, `u` or `d`).
    #[serde(default = "default_operation")]
    pub operation: String,
    /// Column holding the source table name.
    #[serde(default = "default_table")]
    pub table: String,
    /// Column holding the source log position.
    #[serde(default = "default_source_position")]
    pub source_position: String,
    /// Column holding the source logical timestamp used to order events.
    #[serde(default = "default_source_timestamp")]
    pub source_timestamp: String,
    /// Column holding the deletion flag.
    #[serde(default = "default_deleted")]
    pub deleted: String,
}

impl AuditColumnsConfig {
    pub const DEFAULT_OPERATION: &'static str = "__op";
    pub const DEFAULT_TABLE: &'static str = "__table";
    pub const DEFAULT_SOURCE_POSITION: &'static str = "__lsn";
    pub const DEFAULT_SOURCE_TIMESTAMP: &'static str = "__source_ts_ms";
    pub const DEFAULT_DELETED: &'static str = "__deleted";

    /// Returns all configured column names.
    pub fn names(&self) -> [&str; 5] {
        [
            &self.operation,
            &self.table,
            &self.source_position,
            &self.source_timestamp,
            &self.deleted,
        ]
    }

    /// Ensures every audit column name is non-empty and unique.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let names = self.names();
        for (index, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(ValidationError::InvalidFieldValue {
                    field: "audit_columns".to_string(),
                    constraint: "column names must not be empty".to_string(),
                });
            }

            if names[..index].contains(name) {
                return Err(ValidationError::DuplicateAuditColumn(name.to_string()));
            }
        }

        Ok(())
    }
}

impl Default for AuditColumnsConfig {
    fn default() -> Self {
        Self {
            operation: default_operation(),
            table: default_table(),
            source_position: default_source_position(),
            source_timestamp: default_source_timestamp(),
            deleted: default_deleted(),
        }
    }
}

fn default_operation() -> String {
    AuditColumnsConfig::DEFAULT_OPERATION.to_string()
}

fn default_table() -> String {
    AuditColumnsConfig::DEFAULT_TABLE.to_string()
}

fn default_source_position() -> String {
    AuditColumnsConfig::DEFAULT_SOURCE_POSITION.to_string()
}

fn default_source_timestamp() -> String {
    AuditColumnsConfig::DEFAULT_SOURCE_TIMESTAMP.to_string()
}

fn default_deleted() -> String {
    AuditColumnsConfig::DEFAULT_DELETED.to_string()
}
