use sink::test_utils::committer::RecordingCommitter;
use sink::test_utils::event::{
    COMPOSITE_DESTINATION, CUSTOMERS_DESTINATION, composite_key, composite_key_event,
    customer_event, customer_key,
};
use sink::types::Cell;
use sink_config::shared::SinkConfig;
use sink_telemetry::tracing::init_test_tracing;

use crate::support::{memory_sink, name_and_op, table_for, test_config};

fn pair(name: &str, op: &str) -> Option<(String, String)> {
    Some((name.to_string(), op.to_string()))
}

#[tokio::test(flavor = "multi_thread")]
async fn upserts_follow_latest_timestamp_then_operation_priority() {
    init_test_tracing();
    let sink = memory_sink(test_config());
    let committer = RecordingCommitter::new();
    let table = table_for(&sink, CUSTOMERS_DESTINATION);
    let store = sink.store().clone();

    sink.handle_batch(
        vec![
            customer_event(1, "c", "a", 100),
            customer_event(2, "c", "b", 100),
            customer_event(3, "c", "c", 100),
        ],
        &committer,
    )
    .await
    .unwrap();
    assert_eq!(store.table_rows(&table).await.unwrap().len(), 3);

    // Existing rows are replaced or removed, new ones are inserted.
    sink.handle_batch(
        vec![
            customer_event(1, "r", "a", 200),
            customer_event(2, "d", "b", 200),
            customer_event(3, "u", "UpdatednameV1", 200),
            customer_event(4, "c", "d", 200),
        ],
        &committer,
    )
    .await
    .unwrap();
    assert_eq!(store.table_rows(&table).await.unwrap().len(), 3);
    assert_eq!(name_and_op(&store, &table, &customer_key(1)).await, pair("a", "r"));
    assert_eq!(name_and_op(&store, &table, &customer_key(2)).await, None);
    assert_eq!(
        name_and_op(&store, &table, &customer_key(3)).await,
        pair("UpdatednameV1", "u")
    );
    assert_eq!(name_and_op(&store, &table, &customer_key(4)).await, pair("d", "c"));

    // Duplicates within a batch keep the latest source timestamp.
    sink.handle_batch(
        vec![
            customer_event(3, "r", "UpdatednameV2", 1),
            customer_event(3, "u", "UpdatednameV3", 2),
            customer_event(3, "u", "UpdatednameV4", 3),
            customer_event(4, "u", "Updatedname-4-V1", 4),
            customer_event(4, "u", "Updatedname-4-V2", 5),
            customer_event(4, "d", "Updatedname-4-V3", 6),
            customer_event(5, "d", "e", 7),
            customer_event(6, "r", "f", 8),
            customer_event(6, "r", "f", 9),
            customer_event(6, "u", "f", 10),
            customer_event(6, "u", "Updatedname-6-V1", 11),
        ],
        &committer,
    )
    .await
    .unwrap();
    assert_eq!(store.table_rows(&table).await.unwrap().len(), 3);
    assert_eq!(
        name_and_op(&store, &table, &customer_key(3)).await,
        pair("UpdatednameV4", "u")
    );
    assert_eq!(name_and_op(&store, &table, &customer_key(4)).await, None);
    assert_eq!(name_and_op(&store, &table, &customer_key(5)).await, None);
    assert_eq!(
        name_and_op(&store, &table, &customer_key(6)).await,
        pair("Updatedname-6-V1", "u")
    );

    // Equal timestamps fall back to the operation priority. Stored rows are never consulted, so
    // older timestamps still overwrite them.
    sink.handle_batch(
        vec![
            customer_event(3, "d", "UpdatednameV5", 1),
            customer_event(3, "u", "UpdatednameV6", 1),
            customer_event(6, "c", "Updatedname-6-V2", 1),
            customer_event(6, "r", "Updatedname-6-V3", 1),
        ],
        &committer,
    )
    .await
    .unwrap();
    assert_eq!(name_and_op(&store, &table, &customer_key(3)).await, None);
    assert_eq!(
        name_and_op(&store, &table, &customer_key(6)).await,
        pair("Updatedname-6-V3", "r")
    );

    // An update after a delete and a snapshot read wins when it is the latest.
    sink.handle_batch(
        vec![
            customer_event(7, "u", "g", 1),
            customer_event(7, "d", "g", 2),
            customer_event(7, "r", "g", 3),
            customer_event(7, "u", "Updatedname-7-V1", 4),
        ],
        &committer,
    )
    .await
    .unwrap();
    assert_eq!(
        name_and_op(&store, &table, &customer_key(7)).await,
        pair("Updatedname-7-V1", "u")
    );

    let reports = committer.reports().await;
    assert_eq!(reports.len(), 5);
    assert!(reports.iter().all(|report| report.fully_acknowledged));
}

#[tokio::test(flavor = "multi_thread")]
async fn composite_keys_are_deduplicated_as_a_unit() {
    init_test_tracing();
    let sink = memory_sink(test_config());
    let committer = RecordingCommitter::new();
    let table = table_for(&sink, COMPOSITE_DESTINATION);
    let store = sink.store().clone();

    sink.handle_batch(
        vec![
            composite_key_event(1, "c", "user1", 1),
            composite_key_event(1, "c", "user2", 1),
            composite_key_event(1, "u", "user1", 2),
            composite_key_event(1, "r", "user1", 3),
        ],
        &committer,
    )
    .await
    .unwrap();

    let rows = store.table_rows(&table).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        name_and_op(&store, &table, &composite_key(1, "user1")).await,
        pair("user1", "r")
    );
    assert_eq!(
        name_and_op(&store, &table, &composite_key(1, "user2")).await,
        pair("user2", "c")
    );

    sink.handle_batch(
        vec![
            composite_key_event(1, "u", "user1", 2),
            composite_key_event(1, "r", "user1", 3),
            composite_key_event(1, "d", "user1", 3),
            composite_key_event(1, "d", "user2", 1),
        ],
        &committer,
    )
    .await
    .unwrap();

    assert!(store.table_rows(&table).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn redelivered_batch_leaves_table_unchanged() {
    init_test_tracing();
    let sink = memory_sink(test_config());
    let committer = RecordingCommitter::new();
    let table = table_for(&sink, CUSTOMERS_DESTINATION);
    let store = sink.store().clone();

    let batch = vec![
        customer_event(1, "c", "a", 1),
        customer_event(2, "c", "b", 1),
        customer_event(1, "u", "a2", 2),
        customer_event(2, "d", "b", 2),
        customer_event(3, "r", "c", 1),
    ];

    sink.handle_batch(batch.clone(), &committer).await.unwrap();
    let first = store.table_rows(&table).await.unwrap();

    let report = sink.handle_batch(batch, &committer).await.unwrap();
    let second = store.table_rows(&table).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.len(), 2);

    let summary = report.table(&table).unwrap().result.clone().unwrap();
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.replaced, 2);
    assert_eq!(summary.deleted, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn keep_deletes_stores_the_deleted_image() {
    init_test_tracing();
    let sink = memory_sink(SinkConfig {
        keep_deletes: true,
        ..test_config()
    });
    let committer = RecordingCommitter::new();
    let table = table_for(&sink, CUSTOMERS_DESTINATION);
    let store = sink.store().clone();

    sink.handle_batch(
        vec![customer_event(1, "c", "a", 1), customer_event(1, "d", "a", 2)],
        &committer,
    )
    .await
    .unwrap();

    let row = store.row(&table, &customer_key(1)).await.unwrap();
    assert_eq!(row.get("__op"), Some(&Cell::from("d")));
    assert_eq!(row.get("__deleted"), Some(&Cell::from("true")));
}

#[tokio::test(flavor = "multi_thread")]
async fn audit_columns_are_stored_with_the_row() {
    init_test_tracing();
    let sink = memory_sink(SinkConfig {
        table_prefix: "debeziumcdc_".to_string(),
        ..test_config()
    });
    let committer = RecordingCommitter::new();
    let store = sink.store().clone();

    sink.handle_batch(vec![customer_event(1, "c", "a", 1_700_000_000_000)], &committer)
        .await
        .unwrap();

    let table = table_for(&sink, CUSTOMERS_DESTINATION);
    assert_eq!(table.as_str(), "debeziumcdc_testc_inventory_customers_upsert");

    let row = store.row(&table, &customer_key(1)).await.unwrap();
    assert_eq!(row.get("__table"), Some(&Cell::from("customers")));
    assert_eq!(row.get("__lsn"), Some(&Cell::I64(33832960)));
    assert_eq!(row.get("__source_ts_ms"), Some(&Cell::I64(1_700_000_000_000)));
    assert_eq!(row.get("__deleted"), Some(&Cell::from("false")));
}
