use std::fmt;
use std::hash::{Hash, Hasher};

use crate::types::ColumnType;

/// A single typed value of a row.
///
/// Equality and hashing are total: floats compare and hash by bit pattern, so a [`Cell`] can be
/// a component of a [`crate::types::CanonicalKey`]. `F64(0.0)` and `F64(-0.0)` are distinct and
/// `NaN` equals itself.
#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Cell {
    /// Returns `true` if the cell is [`Cell::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the column type this cell is stored as, or [`None`] for [`Cell::Null`].
    ///
    /// `int8` columns are stored as [`Cell::I16`], which is why this never returns
    /// [`ColumnType::Int8`].
    pub fn column_type(&self) -> Option<ColumnType> {
        let typ = match self {
            Cell::Null => return None,
            Cell::Bool(_) => ColumnType::Boolean,
            Cell::I16(_) => ColumnType::Int16,
            Cell::I32(_) => ColumnType::Int32,
            Cell::I64(_) => ColumnType::Int64,
            Cell::F32(_) => ColumnType::Float32,
            Cell::F64(_) => ColumnType::Float64,
            Cell::String(_) => ColumnType::String,
            Cell::Bytes(_) => ColumnType::Bytes,
        };

        Some(typ)
    }

    /// Returns the integer value of an integer cell, regardless of its width.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::I16(value) => Some(i64::from(*value)),
            Cell::I32(value) => Some(i64::from(*value)),
            Cell::I64(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string value of a string cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::String(value) => Some(value),
            _ => None,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Null, Cell::Null) => true,
            (Cell::Bool(a), Cell::Bool(b)) => a == b,
            (Cell::I16(a), Cell::I16(b)) => a == b,
            (Cell::I32(a), Cell::I32(b)) => a == b,
            (Cell::I64(a), Cell::I64(b)) => a == b,
            (Cell::F32(a), Cell::F32(b)) => a.to_bits() == b.to_bits(),
            (Cell::F64(a), Cell::F64(b)) => a.to_bits() == b.to_bits(),
            (Cell::String(a), Cell::String(b)) => a == b,
            (Cell::Bytes(a), Cell::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);

        match self {
            Cell::Null => {}
            Cell::Bool(v) => v.hash(state),
            Cell::I16(v) => v.hash(state),
            Cell::I32(v) => v.hash(state),
            Cell::I64(v) => v.hash(state),
            Cell::F32(v) => v.to_bits().hash(state),
            Cell::F64(v) => v.to_bits().hash(state),
            Cell::String(v) => v.hash(state),
            Cell::Bytes(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Bool(v) => write!(f, "{v}"),
            Cell::I16(v) => write!(f, "{v}"),
            Cell::I32(v) => write!(f, "{v}"),
            Cell::I64(v) => write!(f, "{v}"),
            Cell::F32(v) => write!(f, "{v}"),
            Cell::F64(v) => write!(f, "{v}"),
            Cell::String(v) => write!(f, "{v:?}"),
            Cell::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::I32(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::F64(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}
