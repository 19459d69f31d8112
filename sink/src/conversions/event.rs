use std::sync::Arc;

use sink_config::shared::AuditColumnsConfig;

use crate::bail;
use crate::conversions::envelope::{DecodedStruct, parse_struct_envelope};
use crate::error::{ErrorKind, SinkResult};
use crate::types::{
    Cell, ChangeEvent, ColumnSchema, DecodedEvent, Operation, TableName, TableRow, TableSchema,
    extract_key,
};

/// Decodes raw [`ChangeEvent`]s into [`DecodedEvent`]s.
///
/// Decoding is pure: it validates both envelopes, builds the canonical key and extracts the audit
/// fields, but never checks the deletion flag against the operation code.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    audit_columns: AuditColumnsConfig,
}

impl EventDecoder {
    pub fn new(audit_columns: AuditColumnsConfig) -> Self {
        Self { audit_columns }
    }

    /// Decodes the event found at `position` of its batch, destined to `table_name`.
    pub fn decode(
        &self,
        event: &ChangeEvent,
        position: usize,
        table_name: TableName,
    ) -> SinkResult<DecodedEvent> {
        if event.key.is_empty() {
            bail!(
                ErrorKind::MalformedEvent,
                "Empty key",
                format!("The event for '{}' has no key", event.destination)
            );
        }
        if is_tombstone(&event.value) {
            bail!(
                ErrorKind::MalformedEvent,
                "Tombstone event",
                format!("The event for '{}' has an empty value", event.destination)
            );
        }

        let key_struct = parse_struct_envelope(&event.key, "key")?;
        let value_struct = parse_struct_envelope(&event.value, "value")?;

        let key_columns: Vec<String> = key_struct
            .fields
            .iter()
            .map(|field| field.name.clone())
            .collect();
        let key = extract_key(&key_columns, &key_struct.row)?;

        let schema = build_table_schema(table_name.clone(), &key_columns, &value_struct)?;
        check_key_matches_row(&key_columns, key.values(), &value_struct.row)?;
        let row = value_struct.row;

        let operation = self.operation(&row)?;
        let timestamp = self.timestamp(&row)?;
        let deleted = self.deleted(&row)?;

        Ok(DecodedEvent {
            key,
            row,
            schema: Arc::new(schema),
            operation,
            timestamp,
            deleted,
            position,
            table_name,
        })
    }

    fn operation(&self, row: &TableRow) -> SinkResult<Operation> {
        let column = &self.audit_columns.operation;
        match row.get(column) {
            Some(Cell::String(code)) => Operation::from_code(code),
            Some(Cell::Null) | None => {
                bail!(
                    ErrorKind::MalformedEvent,
                    "Operation missing",
                    format!("The operation column '{column}' is missing or null")
                );
            }
            Some(other) => {
                bail!(
                    ErrorKind::MalformedEvent,
                    "Invalid operation",
                    format!("The operation column '{column}' holds {other} instead of a string")
                );
            }
        }
    }

    fn timestamp(&self, row: &TableRow) -> SinkResult<i64> {
        let column = &self.audit_columns.source_timestamp;
        let Some(cell) = row.get(column) else {
            bail!(
                ErrorKind::MalformedEvent,
                "Source timestamp missing",
                format!("The source timestamp column '{column}' is missing")
            );
        };

        match cell.as_i64() {
            Some(timestamp) => Ok(timestamp),
            None => {
                bail!(
                    ErrorKind::MalformedEvent,
                    "Invalid source timestamp",
                    format!("The source timestamp column '{column}' holds {cell} instead of an integer")
                );
            }
        }
    }

    fn deleted(&self, row: &TableRow) -> SinkResult<bool> {
        let column = &self.audit_columns.deleted;
        match row.get(column) {
            None | Some(Cell::Null) => Ok(false),
            Some(Cell::Bool(deleted)) => Ok(*deleted),
            Some(Cell::String(flag)) if flag == "true" => Ok(true),
            Some(Cell::String(flag)) if flag == "false" => Ok(false),
            Some(other) => {
                bail!(
                    ErrorKind::MalformedEvent,
                    "Invalid deletion flag",
                    format!("The deletion column '{column}' holds {other}")
                );
            }
        }
    }
}

fn is_tombstone(value: &[u8]) -> bool {
    let trimmed = value.trim_ascii();
    trimmed.is_empty() || trimmed == b"null"
}

/// Fails if the value payload holds other key values than the key payload.
fn check_key_matches_row(key_columns: &[String], key: &[Cell], row: &TableRow) -> SinkResult<()> {
    for (column, key_value) in key_columns.iter().zip(key) {
        match row.get(column) {
            Some(value) if value == key_value => {}
            Some(value) => {
                bail!(
                    ErrorKind::MalformedEvent,
                    "Key and value disagree",
                    format!("The key column '{column}' is {key_value} in the key but {value} in the value")
                );
            }
            None => {
                bail!(
                    ErrorKind::MalformedEvent,
                    "Key column missing from value",
                    format!("The key column '{column}' has no value in the value payload")
                );
            }
        }
    }

    Ok(())
}

/// Builds the table schema of an event from its value struct, flagging key columns as primary.
fn build_table_schema(
    table_name: TableName,
    key_columns: &[String],
    value_struct: &DecodedStruct,
) -> SinkResult<TableSchema> {
    for key_column in key_columns {
        if !value_struct.fields.iter().any(|field| &field.name == key_column) {
            bail!(
                ErrorKind::MalformedEvent,
                "Key column missing from value",
                format!("The key column '{key_column}' is not declared by the value schema")
            );
        }
    }

    let column_schemas = value_struct
        .fields
        .iter()
        .map(|field| {
            let primary_key = key_columns.contains(&field.name);
            ColumnSchema::new(
                field.name.clone(),
                field.typ,
                field.optional && !primary_key,
                primary_key,
            )
        })
        .collect();

    Ok(TableSchema::new(table_name, column_schemas))
}
