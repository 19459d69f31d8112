use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::types::Cell;

/// A complete row of a destination table, keyed by column name.
///
/// Columns are ordered by name so that two rows with the same content always compare and print
/// the same way, whatever the order of the fields in the event they were decoded from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    values: BTreeMap<String, Cell>,
}

impl TableRow {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a column.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.values.get(column)
    }

    /// Sets the value of a column, returning the previous one.
    pub fn insert(&mut self, column: impl Into<String>, value: Cell) -> Option<Cell> {
        self.values.insert(column.into(), value)
    }

    /// Returns the number of columns in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(column, value)` pairs in column name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Cell> {
        self.values.iter()
    }

    pub fn into_values(self) -> BTreeMap<String, Cell> {
        self.values
    }
}

impl<K> FromIterator<(K, Cell)> for TableRow
where
    K: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Cell)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(column, value)| (column.into(), value))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TableRow {
    type Item = (&'a String, &'a Cell);
    type IntoIter = btree_map::Iter<'a, String, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
