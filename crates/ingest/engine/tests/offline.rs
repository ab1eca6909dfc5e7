//! Offline operator scans against scripted chains.

use cadence_chain::{
    BlockEvent, RetryConfig, RetryingSource, SourceError, test_utils::MockChainSource,
};
use cadence_engine::{IngestError, OfflineBackfill, OfflineConfig};
use cadence_storage::{Dataset, test_utils::MemorySink};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

fn offline(operator_id: u64, domain_id: u32, submitted: u32, expected: u32) -> BlockEvent {
    BlockEvent::OperatorOffline {
        operator_id,
        domain_id,
        submitted_bundles: submitted,
        expected_bundles: expected,
        min_required_bundles: 5,
    }
}

fn chain(blocks: u64) -> MockChainSource {
    let timestamps: Vec<u64> = (1..=blocks).map(|n| n * 6_000).collect();
    MockChainSource::linear(1, &timestamps)
}

fn config(start: Option<u64>, end: u64) -> OfflineConfig {
    OfflineConfig { start, end: Some(end), ..Default::default() }
}

#[tokio::test]
async fn test_records_offline_operators_of_epoch_blocks() {
    let source = chain(10);
    source.set_events(
        4,
        vec![
            BlockEvent::DomainEpochCompleted { domain_id: 0, epoch_index: 12 },
            offline(1, 0, 2, 10),
            offline(2, 3, 0, 0),
        ],
    );
    // An offline report without an epoch completion is not scanned for.
    source.set_events(6, vec![offline(9, 0, 0, 10)]);
    let source = Arc::new(source);
    let sink = Arc::new(MemorySink::new());

    let summary = OfflineBackfill::new(source.clone(), sink.clone(), config(None, 10))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let rows: Vec<_> = sink.offline_batches().into_iter().flatten().collect();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].block_number, 4);
    assert_eq!(rows[0].block_hash, MockChainSource::hash_for(4));
    assert_eq!(rows[0].timestamp_ms, 24_000);
    assert_eq!((rows[0].operator_id, rows[0].epoch_index), (1, 12));
    assert_eq!(rows[0].shortfall, 3);
    assert!((rows[0].shortfall_pct - 30.0).abs() < f64::EPSILON);

    // No completion for domain 3 in the block, and nothing was expected.
    assert_eq!((rows[1].operator_id, rows[1].epoch_index), (2, 0));
    assert_eq!(rows[1].shortfall_pct, 0.0);

    assert_eq!(summary.range, Some(1..=10));
    assert_eq!((summary.blocks, summary.epoch_blocks, summary.rows), (10, 1, 2));
    // Only the epoch block had its timestamp resolved.
    assert_eq!(source.calls("timestamp_ms"), 1);
}

#[tokio::test]
async fn test_epoch_block_uses_timestamp_inherent() {
    let source = chain(6);
    source.set_events(
        5,
        vec![BlockEvent::DomainEpochCompleted { domain_id: 0, epoch_index: 3 }, offline(4, 0, 1, 8)],
    );
    source.set_inherent_timestamp(5, 29_750);
    let source = Arc::new(source);
    let sink = Arc::new(MemorySink::new());

    OfflineBackfill::new(source.clone(), sink.clone(), config(Some(1), 6))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let rows: Vec<_> = sink.offline_batches().into_iter().flatten().collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp_ms, 29_750);
    assert_eq!(source.calls("block"), 1);
    assert_eq!(source.calls("timestamp_ms"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_retrying_epoch_timestamp() {
    let mock = chain(4);
    mock.set_events(
        2,
        vec![BlockEvent::DomainEpochCompleted { domain_id: 0, epoch_index: 1 }, offline(1, 0, 0, 4)],
    );
    mock.fail_method("block", SourceError::Timeout);
    let source = Arc::new(RetryingSource::new(
        mock,
        RetryConfig {
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_attempts: None,
        },
    ));
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();

    let scan = OfflineBackfill::new(source.clone(), sink.clone(), config(Some(1), 4));
    let trigger = cancel.clone();
    let handle = tokio::spawn(async move { scan.run(cancel).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    trigger.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(600), handle)
        .await
        .expect("scan did not stop after cancellation")
        .unwrap()
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!((summary.blocks, summary.epoch_blocks, summary.rows), (2, 1, 0));
    assert!(source.inner().calls("block") > 1);
    assert!(sink.offline_batches().is_empty());
}

#[tokio::test]
async fn test_flushes_at_ten_rows_then_residual() {
    let source = chain(3);
    let epoch_block = |operators: u64| {
        let mut events = vec![BlockEvent::DomainEpochCompleted { domain_id: 0, epoch_index: 1 }];
        events.extend((0..operators).map(|operator| offline(operator, 0, 0, 4)));
        events
    };
    source.set_events(2, epoch_block(10));
    source.set_events(3, epoch_block(3));
    let sink = Arc::new(MemorySink::new());

    let summary = OfflineBackfill::new(Arc::new(source), sink.clone(), config(Some(1), 3))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let sizes: Vec<_> = sink.offline_batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, [10, 3]);
    assert_eq!(summary.batches, 2);
}

#[tokio::test]
async fn test_resumes_from_offline_dataset() {
    let source = Arc::new(chain(30));
    let sink = Arc::new(MemorySink::new().with_cursor(Dataset::OfflineOperators, 19));

    let summary = OfflineBackfill::new(source, sink, config(None, 30))
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.range, Some(20..=30));
}

#[tokio::test]
async fn test_default_range_starts_at_one_below_confirmed_tip() {
    let source = Arc::new(chain(100));
    let sink = Arc::new(MemorySink::new());
    let config = OfflineConfig { confirmation_depth: 40, ..Default::default() };

    let summary =
        OfflineBackfill::new(source, sink, config).run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.range, Some(1..=60));
}

#[tokio::test]
async fn test_fails_without_event_support() {
    let source = chain(5);
    source.disable_events();
    let sink = Arc::new(MemorySink::new());

    let err = OfflineBackfill::new(Arc::new(source), sink, config(Some(1), 5))
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::EventsUnavailable(_)));
}
