use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::types::{
    CanonicalKey, Cell, ChangeEvent, ColumnSchema, ColumnType, DecodedEvent, Operation, TableName,
    TableRow, TableSchema,
};

/// Destination of the single key customer events.
pub const CUSTOMERS_DESTINATION: &str = "testc.inventory.customers_upsert";

/// Destination of the composite key customer events.
pub const COMPOSITE_DESTINATION: &str = "testc.inventory.customers_upsert_compositekey";

/// Source position carried by every generated event.
pub const TEST_LSN: i64 = 33832960;

/// Builder for Kafka Connect JSON envelopes.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    name: String,
    fields: Vec<Value>,
    payload: Map<String, Value>,
}

impl EnvelopeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            payload: Map::new(),
        }
    }

    /// Declares a field and sets its payload value.
    pub fn field(mut self, name: &str, typ: &str, optional: bool, value: impl Into<Value>) -> Self {
        self.fields
            .push(json!({"type": typ, "optional": optional, "field": name}));
        self.payload.insert(name.to_string(), value.into());
        self
    }

    /// Sets a payload value without declaring a field.
    pub fn payload_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(name.to_string(), value.into());
        self
    }

    /// Removes a payload value, keeping its field declaration.
    pub fn without_value(mut self, name: &str) -> Self {
        self.payload.remove(name);
        self
    }

    pub fn build(&self) -> String {
        json!({
            "schema": {
                "type": "struct",
                "fields": self.fields,
                "optional": false,
                "name": self.name,
            },
            "payload": self.payload,
        })
        .to_string()
    }
}

/// Key envelope of a customer identified by `id`.
pub fn customer_key_envelope(id: i32) -> EnvelopeBuilder {
    EnvelopeBuilder::new("testc.inventory.customers.Key").field("id", "int32", false, id)
}

/// Key envelope of a customer identified by `(id, first_name)`.
pub fn composite_key_envelope(id: i32, first_name: &str) -> EnvelopeBuilder {
    EnvelopeBuilder::new("testc.inventory.customers.Key")
        .field("id", "int32", false, id)
        .field("first_name", "string", false, first_name)
}

/// Value envelope of a customer row with the default audit columns.
pub fn customer_value_envelope(id: i32, op: &str, first_name: &str, ts: i64) -> EnvelopeBuilder {
    EnvelopeBuilder::new("testc.inventory.customers.Value")
        .field("id", "int32", false, id)
        .field("first_name", "string", false, first_name)
        .field("last_name", "string", false, "Walker")
        .field("email", "string", false, "ed@walker.com")
        .field("__op", "string", true, op)
        .field("__table", "string", true, "customers")
        .field("__lsn", "int64", true, TEST_LSN)
        .field("__source_ts_ms", "int64", true, ts)
        .field("__deleted", "string", true, (op == "d").to_string())
}

/// Customer event keyed by `id`, sent to [`CUSTOMERS_DESTINATION`].
pub fn customer_event(id: i32, op: &str, first_name: &str, ts: i64) -> ChangeEvent {
    ChangeEvent::new(
        customer_key_envelope(id).build(),
        customer_value_envelope(id, op, first_name, ts).build(),
        CUSTOMERS_DESTINATION,
    )
}

/// Customer event keyed by `(id, first_name)`, sent to [`COMPOSITE_DESTINATION`].
pub fn composite_key_event(id: i32, op: &str, first_name: &str, ts: i64) -> ChangeEvent {
    ChangeEvent::new(
        composite_key_envelope(id, first_name).build(),
        customer_value_envelope(id, op, first_name, ts).build(),
        COMPOSITE_DESTINATION,
    )
}

/// Event whose value does not parse.
pub fn malformed_event(destination: &str) -> ChangeEvent {
    ChangeEvent::new(customer_key_envelope(1).build(), "{not json", destination)
}

pub fn customer_key(id: i32) -> CanonicalKey {
    CanonicalKey::new(vec![Cell::I32(id)])
}

pub fn composite_key(id: i32, first_name: &str) -> CanonicalKey {
    CanonicalKey::new(vec![Cell::I32(id), Cell::from(first_name)])
}

/// Table name used by decoded test events.
pub fn customers_table() -> TableName {
    TableName::new("customers")
}

/// Schema of the decoded test events.
pub fn customers_schema() -> TableSchema {
    TableSchema::new(
        customers_table(),
        vec![
            ColumnSchema::new("id", ColumnType::Int32, false, true),
            ColumnSchema::new("first_name", ColumnType::String, false, false),
            ColumnSchema::new("__op", ColumnType::String, true, false),
            ColumnSchema::new("__table", ColumnType::String, true, false),
            ColumnSchema::new("__lsn", ColumnType::Int64, true, false),
            ColumnSchema::new("__source_ts_ms", ColumnType::Int64, true, false),
            ColumnSchema::new("__deleted", ColumnType::String, true, false),
        ],
    )
}

/// Decoded event with an arbitrary key. The row carries `first_name` and the audit columns.
pub fn decoded_event(
    key: CanonicalKey,
    operation: Operation,
    timestamp: i64,
    position: usize,
    first_name: &str,
) -> DecodedEvent {
    let deleted = operation.is_delete();
    let row: TableRow = [
        ("first_name", Cell::from(first_name)),
        ("__op", Cell::from(operation.code())),
        ("__table", Cell::from("customers")),
        ("__lsn", Cell::I64(TEST_LSN)),
        ("__source_ts_ms", Cell::I64(timestamp)),
        ("__deleted", Cell::from(deleted.to_string())),
    ]
    .into_iter()
    .collect();

    DecodedEvent {
        key,
        row,
        schema: Arc::new(customers_schema()),
        operation,
        timestamp,
        deleted,
        position,
        table_name: customers_table(),
    }
}

/// Decoded customer event keyed by `id`, with `id` in its row.
pub fn decoded_customer(
    id: i32,
    operation: Operation,
    timestamp: i64,
    position: usize,
    first_name: &str,
) -> DecodedEvent {
    let mut event = decoded_event(customer_key(id), operation, timestamp, position, first_name);
    event.row.insert("id", Cell::I32(id));
    event
}
