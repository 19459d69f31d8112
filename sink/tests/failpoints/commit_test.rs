use sink::error::ErrorKind;
use sink::failpoints::COMMIT_CHANGES__BEFORE_STORE_CALL;
use sink::sink::{Sink, destination_table_name};
use sink::store::memory::MemoryTableStore;
use sink::test_utils::committer::RecordingCommitter;
use sink::test_utils::event::{CUSTOMERS_DESTINATION, customer_event, customer_key};
use sink::test_utils::failpoints::FailpointScenario;
use sink_config::shared::{CommitRetryConfig, SinkConfig};
use sink_telemetry::tracing::init_test_tracing;

fn create_sink() -> Sink<MemoryTableStore> {
    let config = SinkConfig {
        commit_retry: CommitRetryConfig {
            max_attempts: 3,
            initial_retry_delay_ms: 1,
            max_retry_delay_ms: 5,
            backoff_multiplier: 2.0,
        },
        ..SinkConfig::default()
    };

    Sink::new(config, MemoryTableStore::new()).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_failpoint_is_retried_until_commit_succeeds() {
    init_test_tracing();
    let _scenario =
        FailpointScenario::setup(&[(COMMIT_CHANGES__BEFORE_STORE_CALL, "2*return(transient)")]);

    let sink = create_sink();
    let committer = RecordingCommitter::new();
    let customers = destination_table_name(sink.config(), CUSTOMERS_DESTINATION);

    let report = sink
        .handle_batch(
            vec![customer_event(1, "c", "a", 1), customer_event(2, "c", "b", 1)],
            &committer,
        )
        .await
        .unwrap();

    assert!(report.fully_acknowledged);
    let summary = report.table(&customers).unwrap().result.clone().unwrap();
    assert_eq!(summary.attempts, 3);
    assert_eq!(summary.inserted, 2);
    assert_eq!(sink.store().commit_count().await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_failpoint_exhausting_retries_fails_the_table() {
    init_test_tracing();
    let _scenario =
        FailpointScenario::setup(&[(COMMIT_CHANGES__BEFORE_STORE_CALL, "return(transient)")]);

    let sink = create_sink();
    let committer = RecordingCommitter::new();
    let customers = destination_table_name(sink.config(), CUSTOMERS_DESTINATION);

    let report = sink
        .handle_batch(vec![customer_event(1, "c", "a", 1)], &committer)
        .await
        .unwrap();

    assert!(!report.fully_acknowledged);
    let err = report.table(&customers).unwrap().error().unwrap().clone();
    assert_eq!(err.kind(), ErrorKind::CommitFailed);
    assert_eq!(sink.store().commit_count().await, 0);
    assert!(sink.store().row(&customers, &customer_key(1)).await.is_none());
    assert_eq!(committer.commit_count().await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn fatal_failpoint_is_not_retried() {
    init_test_tracing();
    let _scenario = FailpointScenario::setup(&[(COMMIT_CHANGES__BEFORE_STORE_CALL, "return")]);

    let sink = create_sink();
    let committer = RecordingCommitter::new();
    let customers = destination_table_name(sink.config(), CUSTOMERS_DESTINATION);

    let report = sink
        .handle_batch(vec![customer_event(1, "c", "a", 1)], &committer)
        .await
        .unwrap();

    assert!(!report.fully_acknowledged);
    let err = report.table(&customers).unwrap().error().unwrap().clone();
    assert_eq!(err.kind(), ErrorKind::WithFatalFailure);
    assert_eq!(sink.store().commit_count().await, 0);

    // Table creation is part of the failed commit.
    assert!(sink.store().table_rows(&customers).await.is_none());
    assert!(sink.store().table_names().await.is_empty());
}
