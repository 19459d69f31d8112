use sink::sink::{Sink, destination_table_name};
use sink::store::TableStore;
use sink::store::memory::MemoryTableStore;
use sink::types::{CanonicalKey, Cell, TableName, TableRow};
use sink_config::shared::{CommitRetryConfig, SinkConfig};

/// Configuration with retries short enough for tests.
pub fn test_config() -> SinkConfig {
    SinkConfig {
        commit_retry: CommitRetryConfig {
            max_attempts: 3,
            initial_retry_delay_ms: 1,
            max_retry_delay_ms: 10,
            backoff_multiplier: 2.0,
        },
        ..SinkConfig::default()
    }
}

pub fn memory_sink(config: SinkConfig) -> Sink<MemoryTableStore> {
    Sink::new(config, MemoryTableStore::new()).unwrap()
}

pub fn table_for<S>(sink: &Sink<S>, destination: &str) -> TableName
where
    S: TableStore + Clone + Send + Sync + 'static,
{
    destination_table_name(sink.config(), destination)
}

pub fn string_cell<'a>(row: &'a TableRow, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Cell::as_str)
}

/// Returns `(first_name, __op)` of the row stored under `key`.
pub async fn name_and_op(
    store: &MemoryTableStore,
    table: &TableName,
    key: &CanonicalKey,
) -> Option<(String, String)> {
    let row = store.row(table, key).await?;
    Some((
        string_cell(&row, "first_name")?.to_string(),
        string_cell(&row, "__op")?.to_string(),
    ))
}
