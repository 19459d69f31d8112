//! Metric names and registration for the sink.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

static REGISTER_METRICS: Once = Once::new();

/// Label for the destination table name.
pub const TABLE_NAME_LABEL: &str = "table_name";

/// Label for the [`crate::error::ErrorKind`] of a failure.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Counter for raw events received by [`crate::sink::Sink::handle_batch`].
pub const SINK_EVENTS_RECEIVED_TOTAL: &str = "sink_events_received_total";

/// Counter for events rejected by the decoder.
pub const SINK_EVENTS_REJECTED_TOTAL: &str = "sink_events_rejected_total";

/// Counter for rows written as upserts.
pub const SINK_ROWS_UPSERTED_TOTAL: &str = "sink_rows_upserted_total";

/// Counter for keys removed from a table.
pub const SINK_ROWS_DELETED_TOTAL: &str = "sink_rows_deleted_total";

/// Counter for commit attempts retried after a transient failure.
pub const SINK_COMMIT_RETRIES_TOTAL: &str = "sink_commit_retries_total";

/// Counter for sub-batches whose commit failed.
pub const SINK_COMMIT_FAILURES_TOTAL: &str = "sink_commit_failures_total";

/// Histogram of the time taken to commit one sub-batch, retries included.
pub const SINK_COMMIT_DURATION_SECONDS: &str = "sink_commit_duration_seconds";

/// Registers the metric descriptions. Safe to call multiple times.
pub(crate) fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            SINK_EVENTS_RECEIVED_TOTAL,
            Unit::Count,
            "Total number of change events received"
        );
        describe_counter!(
            SINK_EVENTS_REJECTED_TOTAL,
            Unit::Count,
            "Total number of change events rejected as malformed"
        );
        describe_counter!(
            SINK_ROWS_UPSERTED_TOTAL,
            Unit::Count,
            "Total number of rows inserted or replaced"
        );
        describe_counter!(
            SINK_ROWS_DELETED_TOTAL,
            Unit::Count,
            "Total number of rows removed"
        );
        describe_counter!(
            SINK_COMMIT_RETRIES_TOTAL,
            Unit::Count,
            "Total number of commit attempts retried after a transient failure"
        );
        describe_counter!(
            SINK_COMMIT_FAILURES_TOTAL,
            Unit::Count,
            "Total number of table commits that failed"
        );
        describe_histogram!(
            SINK_COMMIT_DURATION_SECONDS,
            Unit::Seconds,
            "Time taken to commit the changes of one table"
        );
    });
}
