//! Application of a [`ResolvedBatch`] to a [`TableStore`].
//!
//! [`apply_resolved_batch`] defines the effect of a commit on the state of a table. The
//! [`TableCommitter`] performs it against a store: one commit per table at a time, schema
//! creation or evolution planned in memory, then a single atomic store call carrying both the
//! schema and the rows, retried on transient failures.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use sink_config::shared::{CommitRetryConfig, SinkConfig};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::apply::resolve::ResolvedBatch;
use crate::apply::retry::calculate_backoff;
use crate::error::{ErrorKind, SinkResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{COMMIT_CHANGES__BEFORE_STORE_CALL, sink_fail_point};
use crate::metrics::{
    ERROR_KIND_LABEL, SINK_COMMIT_DURATION_SECONDS, SINK_COMMIT_FAILURES_TOTAL,
    SINK_COMMIT_RETRIES_TOTAL, SINK_ROWS_DELETED_TOTAL, SINK_ROWS_UPSERTED_TOTAL,
    TABLE_NAME_LABEL,
};
use crate::sink_error;
use crate::store::{TableState, TableStore};
use crate::types::{CanonicalKey, SchemaChange, TableName, TableRow, TableSchema};

/// Returns the state of a table after committing `upserts` and `deletes` to `state`.
///
/// Every upserted key maps to exactly its new row, every deleted key is absent and all other
/// rows are untouched. Applying the same changes to the result again returns it unchanged.
pub fn apply_resolved_batch(
    mut state: TableState,
    upserts: &HashMap<CanonicalKey, TableRow>,
    deletes: &HashSet<CanonicalKey>,
) -> TableState {
    for key in deletes {
        state.remove(key);
    }
    for (key, row) in upserts {
        state.insert(key.clone(), row.clone());
    }

    state
}

/// What a successful commit changed in the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Upserted keys that were not stored before.
    pub inserted: usize,
    /// Upserted keys whose row was replaced.
    pub replaced: usize,
    /// Deleted keys that were stored before.
    pub deleted: usize,
    /// Whether the table was created or its schema evolved.
    pub schema_changed: bool,
    /// Number of attempts it took, the successful one included.
    pub attempts: u32,
}

/// One async lock per table name.
#[derive(Debug, Clone, Default)]
struct TableLocks {
    locks: Arc<Mutex<HashMap<TableName, Arc<Mutex<()>>>>>,
}

impl TableLocks {
    async fn lock_for(&self, table_name: &TableName) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(table_name.clone()).or_default().clone()
    }
}

/// Commits resolved sub-batches to a [`TableStore`].
#[derive(Debug, Clone)]
pub struct TableCommitter<S> {
    store: S,
    locks: TableLocks,
    retry: CommitRetryConfig,
    allow_field_addition: bool,
}

impl<S> TableCommitter<S>
where
    S: TableStore + Clone + Send + Sync + 'static,
{
    pub fn new(store: S, config: &SinkConfig) -> Self {
        Self {
            store,
            locks: TableLocks::default(),
            retry: config.commit_retry.clone(),
            allow_field_addition: config.allow_field_addition,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Commits `resolved` to its table.
    ///
    /// Transient store failures are retried with exponential backoff up to the configured number
    /// of attempts, after which a [`ErrorKind::CommitFailed`] error carrying the last failure is
    /// returned. Any other error is returned as is after the first attempt.
    pub async fn commit(&self, resolved: &ResolvedBatch) -> SinkResult<CommitSummary> {
        let table_name = &resolved.table_name;
        let table_lock = self.locks.lock_for(table_name).await;
        let _guard = table_lock.lock().await;

        let start = Instant::now();
        let result = self.commit_with_retries(resolved).await;
        histogram!(SINK_COMMIT_DURATION_SECONDS, TABLE_NAME_LABEL => table_name.to_string())
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(summary) => {
                counter!(SINK_ROWS_UPSERTED_TOTAL, TABLE_NAME_LABEL => table_name.to_string())
                    .increment(resolved.upserts.len() as u64);
                counter!(SINK_ROWS_DELETED_TOTAL, TABLE_NAME_LABEL => table_name.to_string())
                    .increment(summary.deleted as u64);

                info!(
                    table = %table_name,
                    upserts = resolved.upserts.len(),
                    deletes = resolved.deletes.len(),
                    inserted = summary.inserted,
                    replaced = summary.replaced,
                    deleted = summary.deleted,
                    attempt = summary.attempts,
                    "committed sub-batch"
                );
            }
            Err(err) => {
                counter!(
                    SINK_COMMIT_FAILURES_TOTAL,
                    TABLE_NAME_LABEL => table_name.to_string(),
                    ERROR_KIND_LABEL => format!("{:?}", err.kind())
                )
                .increment(1);

                error!(table = %table_name, error = %err, "failed to commit sub-batch");
            }
        }

        result
    }

    async fn commit_with_retries(&self, resolved: &ResolvedBatch) -> SinkResult<CommitSummary> {
        let table_name = &resolved.table_name;
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match self.try_commit(resolved).await {
                Ok(summary) => {
                    return Ok(CommitSummary {
                        attempts: attempt,
                        ..summary
                    });
                }
                Err(err) => err,
            };

            if !err.kind().is_commit_retryable() {
                return Err(err);
            }

            if attempt >= max_attempts {
                return Err(sink_error!(
                    ErrorKind::CommitFailed,
                    "Commit failed after exhausting retries",
                    detail = format!("The commit to table '{table_name}' failed {attempt} times"),
                    source: err
                ));
            }

            let delay = calculate_backoff(&self.retry, attempt);
            counter!(SINK_COMMIT_RETRIES_TOTAL, TABLE_NAME_LABEL => table_name.to_string())
                .increment(1);
            warn!(
                table = %table_name,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient commit failure, retrying after backoff"
            );

            sleep(delay).await;
        }
    }

    async fn try_commit(&self, resolved: &ResolvedBatch) -> SinkResult<CommitSummary> {
        let table_name = &resolved.table_name;

        if resolved.is_empty() {
            return Ok(CommitSummary::default());
        }

        let existing_schema = self.store.table_schema(table_name).await?;
        let new_schema = plan_table_schema(
            existing_schema.as_ref(),
            &resolved.schemas,
            self.allow_field_addition,
        )?;

        if existing_schema.is_none() && new_schema.is_none() {
            // Only deletes can target a table that was never created, and they are no-ops.
            debug!(
                table = %table_name,
                deletes = resolved.deletes.len(),
                "table does not exist, nothing to delete"
            );
            return Ok(CommitSummary::default());
        }

        let current_keys = if existing_schema.is_some() {
            self.store.read_current_keys(table_name).await?
        } else {
            HashSet::new()
        };
        let replaced = resolved
            .upserts
            .keys()
            .filter(|key| current_keys.contains(*key))
            .count();
        let deleted = resolved
            .deletes
            .iter()
            .filter(|key| current_keys.contains(*key))
            .count();

        #[cfg(feature = "failpoints")]
        sink_fail_point(COMMIT_CHANGES__BEFORE_STORE_CALL)?;

        self.store
            .commit_changes(
                table_name,
                new_schema.as_ref(),
                &resolved.upserts,
                &resolved.deletes,
            )
            .await?;

        if let Some(schema) = &new_schema {
            info!(
                table = %table_name,
                columns = schema.column_schemas.len(),
                created = existing_schema.is_none(),
                "applied table schema"
            );
        }

        Ok(CommitSummary {
            inserted: resolved.upserts.len() - replaced,
            replaced,
            deleted,
            schema_changed: new_schema.is_some(),
            attempts: 0,
        })
    }
}

/// Folds the schemas of a sub-batch into the schema the table needs to store all of them.
///
/// Returns [`None`] if the existing table can store every schema unchanged. Nothing is applied
/// here, so a conflict with any of the schemas leaves the table as it is.
fn plan_table_schema(
    existing: Option<&TableSchema>,
    incoming: &[Arc<TableSchema>],
    allow_field_addition: bool,
) -> SinkResult<Option<TableSchema>> {
    let mut planned: Option<TableSchema> = None;

    for schema in incoming {
        let next = match planned.as_ref().or(existing) {
            None => Some(schema.as_ref().clone()),
            Some(current) => match current.evolve_to(schema, allow_field_addition)? {
                SchemaChange::Unchanged => None,
                SchemaChange::Evolved(evolved) => Some(evolved),
            },
        };

        if next.is_some() {
            planned = next;
        }
    }

    Ok(planned)
}

async fn sleep(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
