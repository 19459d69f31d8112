use serde_json::Value;
use sink::error::ErrorKind;
use sink::sink::Sink;
use sink::store::TableStore;
use sink::store::memory::MemoryTableStore;
use sink::test_utils::committer::RecordingCommitter;
use sink::test_utils::event::{
    CUSTOMERS_DESTINATION, EnvelopeBuilder, customer_event, customer_key, customer_key_envelope,
    customer_value_envelope,
};
use sink::test_utils::store::FaultInjectingTableStore;
use sink::types::{CanonicalKey, Cell, ChangeEvent, ColumnType};
use sink_config::shared::SinkConfig;
use sink_telemetry::tracing::init_test_tracing;

use crate::support::{memory_sink, table_for, test_config};

fn event_with_extra_field(
    id: i32,
    ts: i64,
    field: &str,
    typ: &str,
    value: impl Into<Value>,
) -> ChangeEvent {
    ChangeEvent::new(
        customer_key_envelope(id).build(),
        customer_value_envelope(id, "u", "a", ts)
            .field(field, typ, true, value)
            .build(),
        CUSTOMERS_DESTINATION,
    )
}

/// Customer event whose `email` column is declared with `email_type`.
fn event_with_email(id: i32, ts: i64, email_type: &str, email: impl Into<Value>) -> ChangeEvent {
    let value = EnvelopeBuilder::new("testc.inventory.customers.Value")
        .field("id", "int32", false, id)
        .field("first_name", "string", false, "a")
        .field("last_name", "string", false, "Walker")
        .field("email", email_type, false, email)
        .field("__op", "string", true, "u")
        .field("__table", "string", true, "customers")
        .field("__lsn", "int64", true, 1)
        .field("__source_ts_ms", "int64", true, ts)
        .field("__deleted", "string", true, "false");

    ChangeEvent::new(
        customer_key_envelope(id).build(),
        value.build(),
        CUSTOMERS_DESTINATION,
    )
}

/// Customer event whose `id` key column is declared with `id_type`.
fn event_with_id_type(id: i32, id_type: &str, op: &str, first_name: &str, ts: i64) -> ChangeEvent {
    let key = EnvelopeBuilder::new("testc.inventory.customers.Key").field("id", id_type, false, id);
    let value = EnvelopeBuilder::new("testc.inventory.customers.Value")
        .field("id", id_type, false, id)
        .field("first_name", "string", false, first_name)
        .field("__op", "string", true, op)
        .field("__source_ts_ms", "int64", true, ts)
        .field("__deleted", "string", true, (op == "d").to_string());

    ChangeEvent::new(key.build(), value.build(), CUSTOMERS_DESTINATION)
}

#[tokio::test(flavor = "multi_thread")]
async fn new_field_is_added_as_nullable_column() {
    init_test_tracing();
    let sink = memory_sink(test_config());
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    sink.handle_batch(vec![customer_event(1, "c", "a", 1)], &committer)
        .await
        .unwrap();

    let report = sink
        .handle_batch(
            vec![event_with_extra_field(2, 2, "loyalty_points", "int32", 10)],
            &committer,
        )
        .await
        .unwrap();

    let summary = report.table(&customers).unwrap().result.clone().unwrap();
    assert!(summary.schema_changed);

    let schema = sink.store().table_schema(&customers).await.unwrap().unwrap();
    let column = schema.column("loyalty_points").unwrap();
    assert_eq!(column.typ, ColumnType::Int32);
    assert!(column.nullable);

    let old_row = sink.store().row(&customers, &customer_key(1)).await.unwrap();
    assert_eq!(old_row.get("loyalty_points"), None);
    let new_row = sink.store().row(&customers, &customer_key(2)).await.unwrap();
    assert_eq!(new_row.get("loyalty_points"), Some(&Cell::I32(10)));
}

#[tokio::test(flavor = "multi_thread")]
async fn integer_column_is_widened() {
    init_test_tracing();
    let sink = memory_sink(test_config());
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    sink.handle_batch(
        vec![event_with_extra_field(1, 1, "loyalty_points", "int32", 10)],
        &committer,
    )
    .await
    .unwrap();
    sink.handle_batch(
        vec![event_with_extra_field(2, 2, "loyalty_points", "int64", 5_000_000_000_i64)],
        &committer,
    )
    .await
    .unwrap();

    let schema = sink.store().table_schema(&customers).await.unwrap().unwrap();
    assert_eq!(
        schema.column("loyalty_points").unwrap().typ,
        ColumnType::Int64
    );

    // Narrower values are still accepted once the column is widened.
    let report = sink
        .handle_batch(
            vec![event_with_extra_field(3, 3, "loyalty_points", "int32", 7)],
            &committer,
        )
        .await
        .unwrap();
    let summary = report.table(&customers).unwrap().result.clone().unwrap();
    assert!(!summary.schema_changed);

    let row = sink.store().row(&customers, &customer_key(2)).await.unwrap();
    assert_eq!(row.get("loyalty_points"), Some(&Cell::I64(5_000_000_000)));
    assert_eq!(sink.store().table_rows(&customers).await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn field_addition_can_be_disallowed() {
    init_test_tracing();
    let sink = memory_sink(SinkConfig {
        allow_field_addition: false,
        ..test_config()
    });
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    sink.handle_batch(vec![customer_event(1, "c", "a", 1)], &committer)
        .await
        .unwrap();

    let report = sink
        .handle_batch(
            vec![event_with_extra_field(2, 2, "loyalty_points", "int32", 10)],
            &committer,
        )
        .await
        .unwrap();

    assert!(!report.fully_acknowledged);
    let err = report.table(&customers).unwrap().error().unwrap().clone();
    assert_eq!(err.kind(), ErrorKind::SchemaConflict);
    assert!(sink.store().row(&customers, &customer_key(2)).await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn incompatible_type_change_is_a_conflict() {
    init_test_tracing();
    let sink = memory_sink(test_config());
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    sink.handle_batch(vec![customer_event(1, "c", "a", 1)], &committer)
        .await
        .unwrap();

    let report = sink
        .handle_batch(vec![event_with_email(2, 2, "int32", 42)], &committer)
        .await
        .unwrap();

    let err = report.table(&customers).unwrap().error().unwrap().clone();
    assert_eq!(err.kind(), ErrorKind::SchemaConflict);

    let schema = sink.store().table_schema(&customers).await.unwrap().unwrap();
    assert_eq!(schema.column("email").unwrap().typ, ColumnType::String);
    assert_eq!(sink.store().table_rows(&customers).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn key_column_type_cannot_change() {
    init_test_tracing();
    let sink = memory_sink(test_config());
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);
    let small_key = CanonicalKey::new(vec![Cell::I16(1)]);

    sink.handle_batch(
        vec![event_with_id_type(1, "int16", "c", "old", 1)],
        &committer,
    )
    .await
    .unwrap();

    // A widened key would store the same id a second time.
    let report = sink
        .handle_batch(
            vec![event_with_id_type(1, "int32", "u", "new", 2)],
            &committer,
        )
        .await
        .unwrap();
    let err = report.table(&customers).unwrap().error().unwrap().clone();
    assert_eq!(err.kind(), ErrorKind::SchemaConflict);

    let rows = sink.store().table_rows(&customers).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[&small_key].get("first_name"), Some(&Cell::from("old")));
    let schema = sink.store().table_schema(&customers).await.unwrap().unwrap();
    assert_eq!(schema.column("id").unwrap().typ, ColumnType::Int16);

    // Events keeping the key type still reach the stored row.
    let report = sink
        .handle_batch(
            vec![event_with_id_type(1, "int16", "d", "old", 3)],
            &committer,
        )
        .await
        .unwrap();
    assert!(report.fully_acknowledged);
    assert!(sink.store().table_rows(&customers).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_sub_batch_leaves_schema_unchanged() {
    init_test_tracing();
    let sink = memory_sink(test_config());
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    sink.handle_batch(vec![customer_event(1, "c", "a", 1)], &committer)
        .await
        .unwrap();
    let before = sink.store().table_schema(&customers).await.unwrap().unwrap();

    // The first winner alone would add a column, the second one conflicts.
    let report = sink
        .handle_batch(
            vec![
                event_with_extra_field(2, 2, "age", "int32", 30),
                event_with_email(3, 2, "int32", 42),
            ],
            &committer,
        )
        .await
        .unwrap();

    let err = report.table(&customers).unwrap().error().unwrap().clone();
    assert_eq!(err.kind(), ErrorKind::SchemaConflict);

    let after = sink.store().table_schema(&customers).await.unwrap().unwrap();
    assert_eq!(before, after);
    assert!(after.column("age").is_none());
    assert_eq!(sink.store().table_rows(&customers).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn schema_of_a_failed_first_commit_is_not_created() {
    init_test_tracing();
    let sink = Sink::new(
        test_config(),
        FaultInjectingTableStore::new(MemoryTableStore::new()),
    )
    .unwrap();
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    sink.store()
        .fail_next_table_commits(&customers, 3, ErrorKind::DestinationIoError);

    let report = sink
        .handle_batch(vec![customer_event(1, "c", "a", 1)], &committer)
        .await
        .unwrap();

    let err = report.table(&customers).unwrap().error().unwrap().clone();
    assert_eq!(err.kind(), ErrorKind::CommitFailed);
    assert!(sink.store().table_schema(&customers).await.unwrap().is_none());
    assert!(sink.store().inner().table_names().await.is_empty());
}
