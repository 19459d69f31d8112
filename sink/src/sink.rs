//! Entry point of the sink: routes a raw batch to per-table pipelines and acknowledges it.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use metrics::counter;
use sink_config::shared::{MalformedEventPolicy, SinkConfig};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::apply::commit::TableCommitter;
use crate::apply::dedup::deduplicate;
use crate::apply::resolve::{ResolutionStats, resolve};
use crate::conversions::event::EventDecoder;
use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::metrics::{
    ERROR_KIND_LABEL, SINK_EVENTS_RECEIVED_TOTAL, SINK_EVENTS_REJECTED_TOTAL, register_metrics,
};
use crate::report::{BatchReport, RejectedEvent, RejectedEventAction, TableCommitOutcome};
use crate::sink_error;
use crate::store::TableStore;
use crate::types::{ChangeEvent, DecodedEvent, TableName};

/// Receives the report of every handled batch, once per batch.
///
/// Implementations acknowledge the batch to the delivery transport when
/// [`BatchReport::fully_acknowledged`] is set. Returning an error makes
/// [`Sink::handle_batch`] fail.
pub trait BatchCommitter {
    fn commit(&self, report: &BatchReport) -> impl Future<Output = SinkResult<()>> + Send;
}

/// Returns the destination table of events sent to `destination`.
///
/// The configured prefix is prepended and, when `flatten_destination` is set, dots are replaced
/// by underscores: `testc.inventory.customers` becomes `testc_inventory_customers`.
pub fn destination_table_name(config: &SinkConfig, destination: &str) -> TableName {
    let name = if config.flatten_destination {
        destination.replace('.', "_")
    } else {
        destination.to_string()
    };

    TableName::new(format!("{}{name}", config.table_prefix))
}

/// CDC upsert sink.
///
/// Each call to [`Sink::handle_batch`] decodes a raw batch, splits it per destination table and
/// applies every table's events concurrently: deduplication to one winner per key, resolution
/// into upserts and deletes and an atomic commit to the [`TableStore`]. Clones share the store,
/// the per-table commit locks and the table concurrency limit.
#[derive(Debug, Clone)]
pub struct Sink<S> {
    config: Arc<SinkConfig>,
    decoder: EventDecoder,
    committer: TableCommitter<S>,
    table_permits: Arc<Semaphore>,
}

impl<S> Sink<S>
where
    S: TableStore + Clone + Send + Sync + 'static,
{
    /// Creates a sink writing to `store`, failing if `config` is invalid.
    pub fn new(config: SinkConfig, store: S) -> SinkResult<Self> {
        config.validate()?;
        register_metrics();

        let decoder = EventDecoder::new(config.audit_columns.clone());
        let committer = TableCommitter::new(store, &config);
        let table_permits = Arc::new(Semaphore::new(config.max_concurrent_tables));

        Ok(Self {
            config: Arc::new(config),
            decoder,
            committer,
            table_permits,
        })
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        self.committer.store()
    }

    /// Applies a raw batch and reports it to `committer` exactly once.
    ///
    /// Malformed events are handled according to
    /// [`SinkConfig::malformed_event_policy`]: with [`MalformedEventPolicy::FailBatch`] nothing is
    /// committed, with [`MalformedEventPolicy::SkipEvent`] they are dropped. A failing table does
    /// not affect the others; it is reported in the returned [`BatchReport`], which is then not
    /// fully acknowledged. An error is only returned if the acknowledgement itself fails.
    pub async fn handle_batch<C>(
        &self,
        events: Vec<ChangeEvent>,
        committer: &C,
    ) -> SinkResult<BatchReport>
    where
        C: BatchCommitter,
    {
        let event_count = events.len();
        counter!(SINK_EVENTS_RECEIVED_TOTAL).increment(event_count as u64);

        let (sub_batches, rejected) = self.decode_batch(&events);

        let fail_batch = !rejected.is_empty()
            && self.config.malformed_event_policy == MalformedEventPolicy::FailBatch;
        if fail_batch {
            error!(
                events = event_count,
                rejected = rejected.len(),
                "batch contains malformed events, nothing was committed"
            );

            let report = BatchReport {
                events: event_count,
                tables: Vec::new(),
                rejected,
                fully_acknowledged: false,
            };
            committer.commit(&report).await?;

            return Ok(report);
        }

        let tables = self.apply_sub_batches(sub_batches).await;
        let fully_acknowledged = tables.iter().all(TableCommitOutcome::is_success);

        let report = BatchReport {
            events: event_count,
            tables,
            rejected,
            fully_acknowledged,
        };

        info!(
            events = report.events,
            tables = report.tables.len(),
            failed_tables = report.failed_tables().count(),
            rejected = report.rejected.len(),
            fully_acknowledged,
            "handled batch"
        );

        committer.commit(&report).await?;

        Ok(report)
    }

    /// Decodes every event, grouping the decoded ones per table in arrival order.
    fn decode_batch(
        &self,
        events: &[ChangeEvent],
    ) -> (BTreeMap<TableName, Vec<DecodedEvent>>, Vec<RejectedEvent>) {
        let action = match self.config.malformed_event_policy {
            MalformedEventPolicy::FailBatch => RejectedEventAction::FailedBatch,
            MalformedEventPolicy::SkipEvent => RejectedEventAction::Dropped,
        };

        let mut sub_batches: BTreeMap<TableName, Vec<DecodedEvent>> = BTreeMap::new();
        let mut rejected = Vec::new();

        for (position, event) in events.iter().enumerate() {
            let table_name = destination_table_name(&self.config, &event.destination);
            match self.decoder.decode(event, position, table_name.clone()) {
                Ok(decoded) => sub_batches.entry(table_name).or_default().push(decoded),
                Err(err) => {
                    counter!(
                        SINK_EVENTS_REJECTED_TOTAL,
                        ERROR_KIND_LABEL => format!("{:?}", err.kind())
                    )
                    .increment(1);
                    warn!(
                        position,
                        destination = %event.destination,
                        action = ?action,
                        error = %err,
                        "rejected malformed event"
                    );

                    rejected.push(RejectedEvent {
                        position,
                        destination: event.destination.clone(),
                        error: err,
                        action,
                    });
                }
            }
        }

        (sub_batches, rejected)
    }

    /// Runs every sub-batch on its own task and waits for all of them.
    async fn apply_sub_batches(
        &self,
        sub_batches: BTreeMap<TableName, Vec<DecodedEvent>>,
    ) -> Vec<TableCommitOutcome> {
        let table_names: BTreeSet<TableName> = sub_batches.keys().cloned().collect();
        let mut join_set = JoinSet::new();

        for (table_name, events) in sub_batches {
            debug!(table = %table_name, events = events.len(), "dispatching sub-batch");

            let committer = self.committer.clone();
            let table_permits = self.table_permits.clone();
            let keep_deletes = self.config.keep_deletes;

            join_set.spawn(async move {
                let event_count = events.len();
                let sub_batch = apply_sub_batch(
                    committer,
                    table_permits,
                    table_name.clone(),
                    events,
                    keep_deletes,
                );

                match AssertUnwindSafe(sub_batch).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let err = sink_error!(
                            ErrorKind::TableWorkerPanic,
                            "Table worker panicked",
                            detail = panic_message(panic.as_ref())
                        );
                        error!(table = %table_name, error = %err, "table worker panicked");

                        TableCommitOutcome {
                            table_name,
                            stats: ResolutionStats {
                                events: event_count,
                                ..ResolutionStats::default()
                            },
                            result: Err(err),
                        }
                    }
                }
            });
        }

        let mut outcomes = Vec::with_capacity(table_names.len());
        let mut join_errors = Vec::new();
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => join_errors.push(SinkError::from(err)),
            }
        }

        // Tasks that did not return an outcome were cancelled, their table is unknown.
        if !join_errors.is_empty() {
            let err = SinkError::from(join_errors);
            for table_name in table_names {
                if !outcomes.iter().any(|outcome| outcome.table_name == table_name) {
                    outcomes.push(TableCommitOutcome {
                        table_name,
                        stats: ResolutionStats::default(),
                        result: Err(err.clone()),
                    });
                }
            }
        }

        outcomes.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        outcomes
    }
}

/// Deduplicates, resolves and commits the events of one table.
async fn apply_sub_batch<S>(
    committer: TableCommitter<S>,
    table_permits: Arc<Semaphore>,
    table_name: TableName,
    events: Vec<DecodedEvent>,
    keep_deletes: bool,
) -> TableCommitOutcome
where
    S: TableStore + Clone + Send + Sync + 'static,
{
    let _permit = match table_permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(err) => {
            return TableCommitOutcome {
                table_name,
                stats: ResolutionStats::default(),
                result: Err(sink_error!(
                    ErrorKind::InvalidState,
                    "Table concurrency limiter closed",
                    source: err
                )),
            };
        }
    };

    let resolved = resolve(table_name.clone(), deduplicate(events), keep_deletes);
    let stats = resolved.stats;
    let result = committer.commit(&resolved).await;

    TableCommitOutcome {
        table_name,
        stats,
        result,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
