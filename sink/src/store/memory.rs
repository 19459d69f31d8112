use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::apply::commit::apply_resolved_batch;
use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::store::{TableState, TableStore};
use crate::types::{CanonicalKey, TableName, TableRow, TableSchema};

#[derive(Debug)]
struct MemoryTable {
    schema: TableSchema,
    rows: TableState,
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<TableName, MemoryTable>,
    commits: usize,
}

/// In-memory [`TableStore`].
///
/// Holds a materialized view of every table the sink wrote to. Useful for tests and for
/// embedders that only need a local copy of the replicated tables. Everything is lost when the
/// process terminates.
#[derive(Debug, Clone, Default)]
pub struct MemoryTableStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the rows of a table, or [`None`] if the table does not exist.
    pub async fn table_rows(&self, table_name: &TableName) -> Option<TableState> {
        let inner = self.inner.lock().await;
        inner.tables.get(table_name).map(|table| table.rows.clone())
    }

    /// Returns the row stored under `key`.
    pub async fn row(&self, table_name: &TableName, key: &CanonicalKey) -> Option<TableRow> {
        let inner = self.inner.lock().await;
        inner.tables.get(table_name)?.rows.get(key).cloned()
    }

    /// Returns the names of the existing tables.
    pub async fn table_names(&self) -> Vec<TableName> {
        let inner = self.inner.lock().await;
        inner.tables.keys().cloned().collect()
    }

    /// Returns the number of successful [`TableStore::commit_changes`] calls.
    pub async fn commit_count(&self) -> usize {
        self.inner.lock().await.commits
    }

    /// Drops every table.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.tables.clear();
        inner.commits = 0;
    }
}

impl TableStore for MemoryTableStore {
    fn name() -> &'static str {
        "memory"
    }

    async fn table_schema(&self, table_name: &TableName) -> SinkResult<Option<TableSchema>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tables
            .get(table_name)
            .map(|table| table.schema.clone()))
    }

    async fn read_current_keys(&self, table_name: &TableName) -> SinkResult<HashSet<CanonicalKey>> {
        let inner = self.inner.lock().await;
        let Some(table) = inner.tables.get(table_name) else {
            bail!(
                ErrorKind::DestinationTableMissing,
                "Table not found",
                format!("The table '{table_name}' does not exist")
            );
        };

        Ok(table.rows.keys().cloned().collect())
    }

    async fn commit_changes(
        &self,
        table_name: &TableName,
        schema: Option<&TableSchema>,
        upserts: &HashMap<CanonicalKey, TableRow>,
        deletes: &HashSet<CanonicalKey>,
    ) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;

        if let Some(schema) = schema {
            match inner.tables.get_mut(table_name) {
                Some(table) => {
                    debug!(table = %table_name, "altering table schema");
                    table.schema = schema.clone();
                }
                None => {
                    info!(table = %table_name, "creating table");
                    inner.tables.insert(
                        table_name.clone(),
                        MemoryTable {
                            schema: schema.clone(),
                            rows: TableState::new(),
                        },
                    );
                }
            }
        }

        let Some(table) = inner.tables.get_mut(table_name) else {
            bail!(
                ErrorKind::DestinationTableMissing,
                "Table not found",
                format!("The table '{table_name}' does not exist")
            );
        };

        let rows = std::mem::take(&mut table.rows);
        table.rows = apply_resolved_batch(rows, upserts, deletes);
        inner.commits += 1;

        Ok(())
    }
}
