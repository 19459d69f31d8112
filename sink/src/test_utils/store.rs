use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ErrorKind, SinkResult};
use crate::sink_error;
use crate::store::TableStore;
use crate::types::{CanonicalKey, TableName, TableRow, TableSchema};

#[derive(Debug, Clone, Copy)]
enum Fault {
    Fail(ErrorKind),
    Panic,
}

#[derive(Debug, Default)]
struct Faults {
    /// Faults applied to the next commits of any table, in order.
    any_table: Vec<Fault>,
    /// Faults applied to the next commits of a specific table, in order.
    per_table: HashMap<TableName, Vec<Fault>>,
}

/// [`TableStore`] wrapper that fails or panics on chosen [`TableStore::commit_changes`] calls.
///
/// Clones share their faults and counters.
#[derive(Debug, Clone)]
pub struct FaultInjectingTableStore<S> {
    inner: S,
    faults: Arc<Mutex<Faults>>,
    commit_attempts: Arc<AtomicUsize>,
}

impl<S> FaultInjectingTableStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(Faults::default())),
            commit_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Makes the next `count` commits, to any table, fail with `kind`.
    pub fn fail_next_commits(&self, count: usize, kind: ErrorKind) {
        let mut faults = self.faults.lock().unwrap();
        faults
            .any_table
            .extend(std::iter::repeat_n(Fault::Fail(kind), count));
    }

    /// Makes the next `count` commits to `table_name` fail with `kind`.
    pub fn fail_next_table_commits(&self, table_name: &TableName, count: usize, kind: ErrorKind) {
        let mut faults = self.faults.lock().unwrap();
        faults
            .per_table
            .entry(table_name.clone())
            .or_default()
            .extend(std::iter::repeat_n(Fault::Fail(kind), count));
    }

    /// Makes the next commit to `table_name` panic.
    pub fn panic_on_next_table_commit(&self, table_name: &TableName) {
        let mut faults = self.faults.lock().unwrap();
        faults
            .per_table
            .entry(table_name.clone())
            .or_default()
            .push(Fault::Panic);
    }

    /// Returns the number of [`TableStore::commit_changes`] calls, failed ones included.
    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    fn next_fault(&self, table_name: &TableName) -> Option<Fault> {
        let mut faults = self.faults.lock().unwrap();
        if let Some(table_faults) = faults.per_table.get_mut(table_name)
            && !table_faults.is_empty()
        {
            return Some(table_faults.remove(0));
        }

        if faults.any_table.is_empty() {
            None
        } else {
            Some(faults.any_table.remove(0))
        }
    }
}

impl<S> TableStore for FaultInjectingTableStore<S>
where
    S: TableStore + Send + Sync,
{
    fn name() -> &'static str {
        "fault_injecting"
    }

    async fn table_schema(&self, table_name: &TableName) -> SinkResult<Option<TableSchema>> {
        self.inner.table_schema(table_name).await
    }

    async fn read_current_keys(&self, table_name: &TableName) -> SinkResult<HashSet<CanonicalKey>> {
        self.inner.read_current_keys(table_name).await
    }

    async fn commit_changes(
        &self,
        table_name: &TableName,
        schema: Option<&TableSchema>,
        upserts: &HashMap<CanonicalKey, TableRow>,
        deletes: &HashSet<CanonicalKey>,
    ) -> SinkResult<()> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);

        match self.next_fault(table_name) {
            Some(Fault::Fail(kind)) => Err(sink_error!(
                kind,
                "Injected commit failure",
                format!("Commit to table '{table_name}' failed on purpose")
            )),
            Some(Fault::Panic) => panic!("injected panic while committing to table '{table_name}'"),
            None => {
                self.inner
                    .commit_changes(table_name, schema, upserts, deletes)
                    .await
            }
        }
    }
}
