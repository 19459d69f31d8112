//! Canonical keys identifying one logical row of a destination table.

use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::types::{Cell, TableRow};

/// Ordered tuple of primary key values.
///
/// Equality and hashing cover the whole tuple, position and type included, so composite keys are
/// compared as a unit and a single column key is just a tuple of length one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    values: Vec<Cell>,
}

impl CanonicalKey {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, value) in self.values.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

/// Builds the [`CanonicalKey`] of a decoded key struct.
///
/// `key_columns` are the key field names in the order declared by the key schema. Every one of
/// them must be present in `key_row` and not null.
pub fn extract_key(key_columns: &[String], key_row: &TableRow) -> SinkResult<CanonicalKey> {
    if key_columns.is_empty() {
        bail!(
            ErrorKind::MalformedEvent,
            "Key without columns",
            "The key schema does not declare any field"
        );
    }

    let mut values = Vec::with_capacity(key_columns.len());
    for column in key_columns {
        match key_row.get(column) {
            None => {
                bail!(
                    ErrorKind::MalformedEvent,
                    "Key column missing",
                    format!("The key column '{column}' is missing from the key payload")
                );
            }
            Some(Cell::Null) => {
                bail!(
                    ErrorKind::MalformedEvent,
                    "Key column is null",
                    format!("The key column '{column}' is null")
                );
            }
            Some(value) => values.push(value.clone()),
        }
    }

    Ok(CanonicalKey::new(values))
}
