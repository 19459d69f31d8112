use sink::error::ErrorKind;
use sink::report::RejectedEventAction;
use sink::sink::Sink;
use sink::store::memory::MemoryTableStore;
use sink::test_utils::committer::RecordingCommitter;
use sink::test_utils::event::{
    COMPOSITE_DESTINATION, CUSTOMERS_DESTINATION, composite_key_event, customer_event,
    customer_key, malformed_event,
};
use sink::test_utils::store::FaultInjectingTableStore;
use sink_config::shared::{MalformedEventPolicy, SinkConfig};
use sink_telemetry::tracing::init_test_tracing;

use crate::support::{memory_sink, table_for, test_config};

fn faulty_sink(config: SinkConfig) -> Sink<FaultInjectingTableStore<MemoryTableStore>> {
    Sink::new(config, FaultInjectingTableStore::new(MemoryTableStore::new())).unwrap()
}

fn two_table_batch() -> Vec<sink::types::ChangeEvent> {
    vec![
        customer_event(1, "c", "a", 1),
        composite_key_event(1, "c", "user1", 1),
        customer_event(2, "c", "b", 1),
        composite_key_event(2, "c", "user2", 1),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_table_does_not_block_the_others() {
    init_test_tracing();
    let sink = faulty_sink(test_config());
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);
    let composite = table_for(&sink, COMPOSITE_DESTINATION);

    sink.store()
        .fail_next_table_commits(&composite, 1, ErrorKind::DestinationError);

    let report = sink.handle_batch(two_table_batch(), &committer).await.unwrap();

    assert!(!report.fully_acknowledged);
    assert_eq!(report.tables.len(), 2);
    assert!(report.table(&customers).unwrap().is_success());

    let failed: Vec<_> = report.failed_tables().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].table_name, composite);
    assert_eq!(
        failed[0].error().map(|err| err.kind()),
        Some(ErrorKind::DestinationError)
    );
    assert_eq!(report.error().map(|err| err.kind()), Some(ErrorKind::DestinationError));

    let store = sink.store().inner();
    assert_eq!(store.table_rows(&customers).await.unwrap().len(), 2);
    // The table would have been created by the failed commit.
    assert!(store.table_rows(&composite).await.is_none());

    assert_eq!(committer.commit_count().await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_table_is_reported_as_failed() {
    init_test_tracing();
    let sink = faulty_sink(test_config());
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);
    let composite = table_for(&sink, COMPOSITE_DESTINATION);

    sink.store().panic_on_next_table_commit(&customers);

    let report = sink.handle_batch(two_table_batch(), &committer).await.unwrap();

    assert!(!report.fully_acknowledged);
    let outcome = report.table(&customers).unwrap();
    assert_eq!(
        outcome.error().map(|err| err.kind()),
        Some(ErrorKind::TableWorkerPanic)
    );
    assert_eq!(outcome.stats.events, 2);
    assert!(report.table(&composite).unwrap().is_success());

    // The table lock is released by the panicking worker, so the next batch succeeds.
    let report = sink.handle_batch(two_table_batch(), &committer).await.unwrap();
    assert!(report.fully_acknowledged);
    assert_eq!(
        sink.store().inner().table_rows(&customers).await.unwrap().len(),
        2
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_failures_are_retried() {
    init_test_tracing();
    let sink = faulty_sink(test_config());
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    sink.store()
        .fail_next_table_commits(&customers, 2, ErrorKind::DestinationThrottled);

    let report = sink
        .handle_batch(vec![customer_event(1, "c", "a", 1)], &committer)
        .await
        .unwrap();

    assert!(report.fully_acknowledged);
    let summary = report.table(&customers).unwrap().result.clone().unwrap();
    assert_eq!(summary.attempts, 3);
    assert_eq!(summary.inserted, 1);
    assert_eq!(sink.store().commit_attempts(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_retries_fail_the_table() {
    init_test_tracing();
    let sink = faulty_sink(test_config());
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    sink.store()
        .fail_next_table_commits(&customers, 5, ErrorKind::DestinationIoError);

    let report = sink
        .handle_batch(vec![customer_event(1, "c", "a", 1)], &committer)
        .await
        .unwrap();

    assert!(!report.fully_acknowledged);
    let err = report.table(&customers).unwrap().error().unwrap().clone();
    assert_eq!(err.kind(), ErrorKind::CommitFailed);
    assert_eq!(sink.store().commit_attempts(), 3);
    assert!(sink.store().inner().row(&customers, &customer_key(1)).await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn non_retryable_failures_are_not_retried() {
    init_test_tracing();
    let sink = faulty_sink(test_config());
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    sink.store()
        .fail_next_table_commits(&customers, 1, ErrorKind::DestinationError);

    let report = sink
        .handle_batch(vec![customer_event(1, "c", "a", 1)], &committer)
        .await
        .unwrap();

    let err = report.table(&customers).unwrap().error().unwrap().clone();
    assert_eq!(err.kind(), ErrorKind::DestinationError);
    assert_eq!(sink.store().commit_attempts(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_event_fails_the_whole_batch_by_default() {
    init_test_tracing();
    let sink = memory_sink(test_config());
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    let report = sink
        .handle_batch(
            vec![
                customer_event(1, "c", "a", 1),
                malformed_event(CUSTOMERS_DESTINATION),
                customer_event(2, "c", "b", 1),
            ],
            &committer,
        )
        .await
        .unwrap();

    assert!(!report.fully_acknowledged);
    assert!(report.tables.is_empty());
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].position, 1);
    assert_eq!(report.rejected[0].action, RejectedEventAction::FailedBatch);
    assert_eq!(
        report.error().map(|err| err.kind()),
        Some(ErrorKind::MalformedEvent)
    );

    assert!(sink.store().table_rows(&customers).await.is_none());
    assert_eq!(sink.store().commit_count().await, 0);
    assert_eq!(committer.commit_count().await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_event_is_dropped_when_skipping() {
    init_test_tracing();
    let sink = memory_sink(SinkConfig {
        malformed_event_policy: MalformedEventPolicy::SkipEvent,
        ..test_config()
    });
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    let report = sink
        .handle_batch(
            vec![
                customer_event(1, "c", "a", 1),
                malformed_event(CUSTOMERS_DESTINATION),
                customer_event(2, "c", "b", 1),
            ],
            &committer,
        )
        .await
        .unwrap();

    assert!(report.fully_acknowledged);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].action, RejectedEventAction::Dropped);
    assert!(report.error().is_none());
    assert_eq!(report.table(&customers).unwrap().stats.events, 2);
    assert_eq!(sink.store().table_rows(&customers).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_batch_is_acknowledged() {
    init_test_tracing();
    let sink = memory_sink(test_config());
    let committer = RecordingCommitter::new();

    let report = sink.handle_batch(Vec::new(), &committer).await.unwrap();

    assert!(report.fully_acknowledged);
    assert_eq!(report.events, 0);
    assert!(report.tables.is_empty());
    assert!(sink.store().table_names().await.is_empty());
    assert_eq!(committer.commit_count().await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_only_batch_on_missing_table_succeeds() {
    init_test_tracing();
    let sink = memory_sink(test_config());
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    let report = sink
        .handle_batch(vec![customer_event(1, "d", "a", 1)], &committer)
        .await
        .unwrap();

    assert!(report.fully_acknowledged);
    let summary = report.table(&customers).unwrap().result.clone().unwrap();
    assert_eq!(summary.deleted, 0);
    assert!(sink.store().table_rows(&customers).await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_acknowledgement_is_returned() {
    init_test_tracing();
    let sink = memory_sink(test_config());
    let committer = RecordingCommitter::failing();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    let err = sink
        .handle_batch(vec![customer_event(1, "c", "a", 1)], &committer)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AcknowledgementFailed);
    assert_eq!(committer.commit_count().await, 1);
    // Rows were committed before the acknowledgement was attempted.
    assert_eq!(sink.store().table_rows(&customers).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_batches_on_one_table_are_serialized() {
    init_test_tracing();
    let sink = memory_sink(SinkConfig {
        max_concurrent_tables: 1,
        ..test_config()
    });
    let committer = RecordingCommitter::new();
    let customers = table_for(&sink, CUSTOMERS_DESTINATION);

    let mut handles = Vec::new();
    for batch in 0..8 {
        let sink = sink.clone();
        let committer = committer.clone();
        handles.push(tokio::spawn(async move {
            let events = (0..10)
                .map(|id| customer_event(batch * 10 + id, "c", "name", 1))
                .collect();
            sink.handle_batch(events, &committer).await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().unwrap().fully_acknowledged);
    }

    assert_eq!(sink.store().table_rows(&customers).await.unwrap().len(), 80);
    assert_eq!(sink.store().commit_count().await, 8);
    assert_eq!(committer.commit_count().await, 8);
}
