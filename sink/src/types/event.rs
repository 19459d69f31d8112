use std::fmt;
use std::sync::Arc;

use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::types::{CanonicalKey, TableName, TableRow, TableSchema};

/// A raw change notification as delivered by the source connector.
///
/// `key` and `value` hold Kafka Connect JSON envelopes. An empty `value` is a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Source identifier, for example `testc.inventory.customers`.
    pub destination: String,
}

impl ChangeEvent {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, destination: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            destination: destination.into(),
        }
    }
}

/// Kind of change carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    /// Row emitted by a snapshot.
    Read,
    Update,
    Delete,
}

impl Operation {
    pub const CREATE_PRIORITY: u8 = 1;
    pub const READ_PRIORITY: u8 = 2;
    pub const UPDATE_PRIORITY: u8 = 3;
    pub const DELETE_PRIORITY: u8 = 4;

    /// Parses an operation code (`c`, `r`, `u` or `d`).
    pub fn from_code(code: &str) -> SinkResult<Self> {
        let operation = match code {
            "c" => Operation::Create,
            "r" => Operation::Read,
            "u" => Operation::Update,
            "d" => Operation::Delete,
            other => {
                bail!(
                    ErrorKind::MalformedEvent,
                    "Unknown operation code",
                    format!("The operation code '{other}' is not one of c, r, u, d")
                );
            }
        };

        Ok(operation)
    }

    pub fn code(&self) -> &'static str {
        match self {
            Operation::Create => "c",
            Operation::Read => "r",
            Operation::Update => "u",
            Operation::Delete => "d",
        }
    }

    /// Rank used to break ties between events with the same source timestamp.
    ///
    /// A delete outranks every other operation, so a row deleted and re-written within the same
    /// millisecond ends up deleted.
    pub fn priority(&self) -> u8 {
        match self {
            Operation::Create => Self::CREATE_PRIORITY,
            Operation::Read => Self::READ_PRIORITY,
            Operation::Update => Self::UPDATE_PRIORITY,
            Operation::Delete => Self::DELETE_PRIORITY,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Operation::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An event decoded and validated against its own schema.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub key: CanonicalKey,
    /// Full value payload, audit columns included.
    pub row: TableRow,
    /// Schema inferred from the value envelope, key columns flagged as primary.
    pub schema: Arc<TableSchema>,
    pub operation: Operation,
    /// Source assigned logical timestamp. Distinct events may share it.
    pub timestamp: i64,
    /// Deletion flag as read from the row, independently of `operation`.
    pub deleted: bool,
    /// Position of the event in the raw batch.
    pub position: usize,
    pub table_name: TableName,
}

impl DecodedEvent {
    /// Returns `true` if the deletion flag disagrees with the operation code.
    pub fn has_flag_mismatch(&self) -> bool {
        self.deleted != self.operation.is_delete()
    }
}
