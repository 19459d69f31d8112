use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::sink_error;

/// Name of a destination table.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct TableName(String);

impl TableName {
    /// Creates a new [`TableName`].
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for TableName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Logical type of a column, named after the Kafka Connect primitive schema types.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ColumnType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Boolean,
    String,
    Bytes,
}

impl ColumnType {
    /// Returns the Kafka Connect name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Int8 => "int8",
            ColumnType::Int16 => "int16",
            ColumnType::Int32 => "int32",
            ColumnType::Int64 => "int64",
            ColumnType::Float32 => "float32",
            ColumnType::Float64 => "float64",
            ColumnType::Boolean => "boolean",
            ColumnType::String => "string",
            ColumnType::Bytes => "bytes",
        }
    }

    /// Returns `true` if values of type `other` can be stored in a column of this type without
    /// changing the column.
    pub fn accepts(&self, other: ColumnType) -> bool {
        *self == other || other.can_widen_to(*self)
    }

    /// Returns `true` if a column of this type may be widened to `other`.
    ///
    /// Widening follows `int8 -> int16 -> int32 -> int64` and `float32 -> float64`.
    pub fn can_widen_to(&self, other: ColumnType) -> bool {
        self.family().is_some()
            && self.family() == other.family()
            && self.rank_in_family() < other.rank_in_family()
    }

    fn family(&self) -> Option<TypeFamily> {
        match self {
            ColumnType::Int8 | ColumnType::Int16 | ColumnType::Int32 | ColumnType::Int64 => {
                Some(TypeFamily::Integer)
            }
            ColumnType::Float32 | ColumnType::Float64 => Some(TypeFamily::Float),
            ColumnType::Boolean | ColumnType::String | ColumnType::Bytes => None,
        }
    }

    fn rank_in_family(&self) -> u8 {
        match self {
            ColumnType::Int8 | ColumnType::Float32 => 0,
            ColumnType::Int16 | ColumnType::Float64 => 1,
            ColumnType::Int32 => 2,
            ColumnType::Int64 => 3,
            ColumnType::Boolean | ColumnType::String | ColumnType::Bytes => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum TypeFamily {
    Integer,
    Float,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let typ = match s {
            "int8" => ColumnType::Int8,
            "int16" => ColumnType::Int16,
            "int32" => ColumnType::Int32,
            "int64" => ColumnType::Int64,
            "float32" => ColumnType::Float32,
            "float64" => ColumnType::Float64,
            "boolean" => ColumnType::Boolean,
            "string" => ColumnType::String,
            "bytes" => ColumnType::Bytes,
            other => {
                return Err(sink_error!(
                    ErrorKind::MalformedEvent,
                    "Unsupported field type",
                    format!("The field type '{other}' is not supported")
                ));
            }
        };

        Ok(typ)
    }
}

/// Schema of a single column of a destination table.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub typ: ColumnType,
    pub nullable: bool,
    /// Whether the column is part of the table's primary key.
    pub primary_key: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, typ: ColumnType, nullable: bool, primary_key: bool) -> Self {
        Self {
            name: name.into(),
            typ,
            nullable,
            primary_key,
        }
    }
}

/// Schema of a destination table.
///
/// Columns keep the order in which they were declared by the value schema of the first event
/// that created the table, with columns added by evolution appended at the end.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableSchema {
    pub name: TableName,
    pub column_schemas: Vec<ColumnSchema>,
}

/// Result of comparing an incoming schema with the schema of an existing table.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SchemaChange {
    /// The existing table can store the incoming rows as is.
    Unchanged,
    /// The existing table must be altered to the contained schema first.
    Evolved(TableSchema),
}

impl TableSchema {
    pub fn new(name: TableName, column_schemas: Vec<ColumnSchema>) -> Self {
        Self {
            name,
            column_schemas,
        }
    }

    /// Returns the column with the given name.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.column_schemas.iter().find(|column| column.name == name)
    }

    /// Returns the names of the primary key columns in declaration order.
    pub fn primary_key_names(&self) -> impl Iterator<Item = &str> {
        self.column_schemas
            .iter()
            .filter(|column| column.primary_key)
            .map(|column| column.name.as_str())
    }

    /// Returns `true` if the table has at least one primary key column.
    pub fn has_primary_keys(&self) -> bool {
        self.column_schemas.iter().any(|column| column.primary_key)
    }

    /// Computes how this schema must change to store rows of `incoming`.
    ///
    /// Accepted changes are new columns (added as nullable, only when `allow_field_addition` is
    /// set), integer and float widenings of non-key columns and relaxing a column to nullable.
    /// Anything else, including a different primary key or a key column changing type, is a
    /// [`ErrorKind::SchemaConflict`].
    pub fn evolve_to(
        &self,
        incoming: &TableSchema,
        allow_field_addition: bool,
    ) -> SinkResult<SchemaChange> {
        let existing_keys: Vec<&str> = self.primary_key_names().collect();
        let incoming_keys: Vec<&str> = incoming.primary_key_names().collect();
        if existing_keys != incoming_keys {
            return Err(sink_error!(
                ErrorKind::SchemaConflict,
                "Primary key mismatch",
                format!(
                    "Table '{}' has primary key ({}) but the event declares ({})",
                    self.name,
                    existing_keys.join(", "),
                    incoming_keys.join(", ")
                )
            ));
        }

        let mut evolved = self.clone();
        let mut changed = false;

        for incoming_column in &incoming.column_schemas {
            let Some(existing_column) = evolved
                .column_schemas
                .iter_mut()
                .find(|column| column.name == incoming_column.name)
            else {
                if !allow_field_addition {
                    return Err(sink_error!(
                        ErrorKind::SchemaConflict,
                        "Column addition not allowed",
                        format!(
                            "Column '{}' does not exist in table '{}'",
                            incoming_column.name, self.name
                        )
                    ));
                }

                evolved.column_schemas.push(ColumnSchema {
                    nullable: true,
                    ..incoming_column.clone()
                });
                changed = true;
                continue;
            };

            // Key cells of different types never compare equal, so stored rows would no longer
            // be found under their key.
            if existing_column.primary_key && existing_column.typ != incoming_column.typ {
                return Err(sink_error!(
                    ErrorKind::SchemaConflict,
                    "Primary key type change",
                    format!(
                        "Primary key column '{}' of table '{}' has type {} and cannot change to {}",
                        existing_column.name, self.name, existing_column.typ, incoming_column.typ
                    )
                ));
            }

            if existing_column.typ.can_widen_to(incoming_column.typ) {
                existing_column.typ = incoming_column.typ;
                changed = true;
            } else if !existing_column.typ.accepts(incoming_column.typ) {
                return Err(sink_error!(
                    ErrorKind::SchemaConflict,
                    "Incompatible column type",
                    format!(
                        "Column '{}' of table '{}' has type {} and cannot store {}",
                        existing_column.name, self.name, existing_column.typ, incoming_column.typ
                    )
                ));
            }

            if incoming_column.nullable && !existing_column.nullable {
                existing_column.nullable = true;
                changed = true;
            }
        }

        for existing_column in &self.column_schemas {
            if !existing_column.nullable && incoming.column(&existing_column.name).is_none() {
                return Err(sink_error!(
                    ErrorKind::SchemaConflict,
                    "Required column missing",
                    format!(
                        "Required column '{}' of table '{}' is missing from the event",
                        existing_column.name, self.name
                    )
                ));
            }
        }

        if changed {
            Ok(SchemaChange::Evolved(evolved))
        } else {
            Ok(SchemaChange::Unchanged)
        }
    }
}
