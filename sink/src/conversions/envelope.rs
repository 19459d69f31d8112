use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::bail;
use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::sink_error;
use crate::types::{Cell, ColumnType, TableRow};

/// Kafka Connect JSON envelope: a struct schema and its payload.
#[derive(Debug, Deserialize)]
struct Envelope {
    schema: StructSchema,
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct StructSchema {
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    optional: bool,
    field: String,
}

/// A field declared by a struct schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeclaredField {
    pub(crate) name: String,
    pub(crate) typ: ColumnType,
    pub(crate) optional: bool,
}

/// A struct envelope whose payload was validated against its schema.
#[derive(Debug)]
pub(crate) struct DecodedStruct {
    /// Fields in declaration order.
    pub(crate) fields: Vec<DeclaredField>,
    pub(crate) row: TableRow,
}

/// Parses and validates a struct envelope. `part` names the envelope in error details.
pub(crate) fn parse_struct_envelope(bytes: &[u8], part: &str) -> SinkResult<DecodedStruct> {
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(|err| {
        sink_error!(
            ErrorKind::MalformedEvent,
            "Invalid JSON envelope",
            detail = format!("The {part} is not a valid schema and payload envelope"),
            source: err
        )
    })?;

    if envelope.schema.typ != "struct" {
        bail!(
            ErrorKind::MalformedEvent,
            "Envelope is not a struct",
            format!(
                "The {part} schema has type '{}' instead of 'struct'",
                envelope.schema.typ
            )
        );
    }

    let Value::Object(mut payload) = envelope.payload else {
        bail!(
            ErrorKind::MalformedEvent,
            "Payload is not an object",
            format!("The {part} payload is not a JSON object")
        );
    };

    let mut seen = HashSet::with_capacity(envelope.schema.fields.len());
    let mut fields = Vec::with_capacity(envelope.schema.fields.len());
    let mut row = TableRow::new();

    for field in envelope.schema.fields {
        if !seen.insert(field.field.clone()) {
            bail!(
                ErrorKind::MalformedEvent,
                "Duplicate field",
                format!("The {part} schema declares the field '{}' twice", field.field)
            );
        }

        let typ: ColumnType = field.typ.parse()?;
        let cell = match payload.remove(&field.field) {
            None | Some(Value::Null) if field.optional => Cell::Null,
            None | Some(Value::Null) => {
                bail!(
                    ErrorKind::MalformedEvent,
                    "Required field missing",
                    format!(
                        "The required field '{}' is missing or null in the {part} payload",
                        field.field
                    )
                );
            }
            Some(value) => parse_cell(typ, &value, &field.field)?,
        };

        row.insert(field.field.clone(), cell);
        fields.push(DeclaredField {
            name: field.field,
            typ,
            optional: field.optional,
        });
    }

    if let Some(undeclared) = first_key(&payload) {
        bail!(
            ErrorKind::MalformedEvent,
            "Undeclared field",
            format!("The {part} payload carries the field '{undeclared}' which its schema does not declare")
        );
    }

    Ok(DecodedStruct { fields, row })
}

fn first_key(payload: &Map<String, Value>) -> Option<&str> {
    payload.keys().next().map(String::as_str)
}

/// Converts a JSON value into a [`Cell`] of the declared type.
fn parse_cell(typ: ColumnType, value: &Value, field: &str) -> SinkResult<Cell> {
    let cell = match typ {
        ColumnType::Int8 => {
            let value = i8::try_from(parse_integer(value, typ, field)?)
                .map_err(|err| out_of_range(typ, field, err))?;
            Cell::I16(i16::from(value))
        }
        ColumnType::Int16 => Cell::I16(
            i16::try_from(parse_integer(value, typ, field)?)
                .map_err(|err| out_of_range(typ, field, err))?,
        ),
        ColumnType::Int32 => Cell::I32(
            i32::try_from(parse_integer(value, typ, field)?)
                .map_err(|err| out_of_range(typ, field, err))?,
        ),
        ColumnType::Int64 => Cell::I64(parse_integer(value, typ, field)?),
        ColumnType::Float32 => Cell::F32(parse_float(value, typ, field)? as f32),
        ColumnType::Float64 => Cell::F64(parse_float(value, typ, field)?),
        ColumnType::Boolean => match value {
            Value::Bool(value) => Cell::Bool(*value),
            _ => return Err(type_mismatch(typ, field, value)),
        },
        ColumnType::String => match value {
            Value::String(value) => Cell::String(value.clone()),
            _ => return Err(type_mismatch(typ, field, value)),
        },
        ColumnType::Bytes => match value {
            Value::String(encoded) => Cell::Bytes(STANDARD.decode(encoded).map_err(|err| {
                sink_error!(
                    ErrorKind::MalformedEvent,
                    "Invalid base64 value",
                    detail = format!("The bytes field '{field}' is not valid base64"),
                    source: err
                )
            })?),
            _ => return Err(type_mismatch(typ, field, value)),
        },
    };

    Ok(cell)
}

fn parse_integer(value: &Value, typ: ColumnType, field: &str) -> SinkResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| type_mismatch(typ, field, value))
}

fn parse_float(value: &Value, typ: ColumnType, field: &str) -> SinkResult<f64> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| type_mismatch(typ, field, value)),
        _ => Err(type_mismatch(typ, field, value)),
    }
}

fn type_mismatch(typ: ColumnType, field: &str, value: &Value) -> SinkError {
    sink_error!(
        ErrorKind::MalformedEvent,
        "Value does not match its declared type",
        format!("The field '{field}' is declared as {typ} but holds {value}")
    )
}

fn out_of_range(
    typ: ColumnType,
    field: &str,
    err: std::num::TryFromIntError,
) -> SinkError {
    sink_error!(
        ErrorKind::MalformedEvent,
        "Integer out of range",
        detail = format!("The value of field '{field}' does not fit in {typ}"),
        source: err
    )
}
