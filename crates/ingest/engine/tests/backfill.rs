//! Block time backfill against scripted chains.

use alloy_primitives::B256;
use cadence_chain::{
    ChainKind, DigestItem, RetryConfig, RetryingSource, SourceError,
    test_utils::MockChainSource,
};
use cadence_engine::{
    BackfillConfig, BackfillWalker, ChainStrategy, FlushPolicy, IngestError,
};
use cadence_storage::{BlockExtension, Dataset, test_utils::MemorySink};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

fn explicit(start: u64, end: u64) -> BackfillConfig {
    BackfillConfig { start: Some(start), end: Some(end), ..Default::default() }
}

fn walker(
    source: &Arc<MockChainSource>,
    sink: &Arc<MemorySink>,
    chain: ChainKind,
    config: BackfillConfig,
) -> BackfillWalker<MockChainSource, MemorySink> {
    BackfillWalker::new(source.clone(), sink.clone(), ChainStrategy::for_chain(chain), config)
}

#[tokio::test]
async fn test_four_blocks_emit_three_rows_in_one_batch() {
    let source = Arc::new(MockChainSource::linear(100, &[1_000, 2_000, 3_000, 4_000]));
    let sink = Arc::new(MemorySink::new());

    let summary = walker(&source, &sink, ChainKind::Consensus, explicit(100, 103))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let batches = sink.block_batches(ChainKind::Consensus);
    assert_eq!(batches.len(), 1);
    let numbers: Vec<_> = batches[0].iter().map(|r| r.block_number).collect();
    let deltas: Vec<_> = batches[0].iter().map(|r| r.delta_since_parent_ms).collect();
    assert_eq!(numbers, [101, 102, 103]);
    assert_eq!(deltas, [1_000, 1_000, 1_000]);
    assert_eq!(batches[0][0].timestamp_utc, "1970-01-01T00:00:02.000Z");

    let path = &sink.paths()[0];
    assert!(path.starts_with("memory/block_times/chain=consensus/date=1970-01-01"));

    assert_eq!(summary.range, Some(100..=103));
    assert_eq!((summary.blocks, summary.rows, summary.batches), (4, 3, 1));
    assert!(!summary.cancelled);
}

#[tokio::test]
async fn test_single_mismatch_suppresses_only_its_transition() {
    let timestamps = [1_000, 2_000, 3_500, 4_000, 4_600, 6_000];
    let source = Arc::new(MockChainSource::linear(1, &timestamps));
    source.set_parent(4, B256::repeat_byte(0xee));
    let sink = Arc::new(MemorySink::new());

    let summary = walker(&source, &sink, ChainKind::Consensus, explicit(1, 6))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let rows = sink.block_rows(ChainKind::Consensus);
    let emitted: Vec<_> = rows.iter().map(|r| (r.block_number, r.delta_since_parent_ms)).collect();
    // Block 5 is measured against block 4, the block after the mismatch.
    assert_eq!(emitted, [(2, 1_000), (3, 1_500), (5, 600), (6, 1_400)]);
    assert_eq!(summary.anomalies, 1);
}

#[tokio::test]
async fn test_resumes_after_persisted_rows() {
    let timestamps: Vec<u64> = (1..=200).map(|n| n * 6_000).collect();
    let source = Arc::new(MockChainSource::linear(1, &timestamps));
    let sink =
        Arc::new(MemorySink::new().with_cursor(Dataset::BlockTimes(ChainKind::Consensus), 150));
    let strategy = ChainStrategy::for_chain(ChainKind::Consensus).with_confirmation_depth(10);

    let summary = BackfillWalker::new(source, sink.clone(), strategy, BackfillConfig::default())
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.range, Some(151..=190));
    let rows = sink.block_rows(ChainKind::Consensus);
    assert_eq!(rows.first().map(|r| r.block_number), Some(152));
    assert_eq!(rows.last().map(|r| r.block_number), Some(190));
}

#[tokio::test]
async fn test_explicit_start_skips_resume_lookup() {
    let source = Arc::new(MockChainSource::linear(1, &[1, 2, 3]));
    let sink =
        Arc::new(MemorySink::new().with_cursor(Dataset::BlockTimes(ChainKind::Consensus), 500));

    walker(&source, &sink, ChainKind::Consensus, explicit(1, 3))
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(sink.resume_calls(), 0);
    assert_eq!(sink.block_rows(ChainKind::Consensus).len(), 2);
}

#[tokio::test]
async fn test_failed_resume_lookup_starts_from_window() {
    let timestamps: Vec<u64> = (1..=100).collect();
    let source = Arc::new(MockChainSource::linear(1, &timestamps));
    let sink = Arc::new(MemorySink::new());
    sink.fail_resume();
    let config = BackfillConfig { window: 20, ..Default::default() };
    let strategy = ChainStrategy::for_chain(ChainKind::Consensus).with_confirmation_depth(0);

    let summary = BackfillWalker::new(source, sink, strategy, config)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.range, Some(80..=100));
}

#[tokio::test]
async fn test_empty_range_is_not_an_error() {
    let source = Arc::new(MockChainSource::linear(1, &[1, 2, 3]));
    let sink = Arc::new(MemorySink::new());

    let summary = walker(&source, &sink, ChainKind::Consensus, explicit(10, 5))
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.range, None);
    assert_eq!(source.calls("block_hash"), 0);
    assert!(sink.paths().is_empty());
}

#[tokio::test]
async fn test_flushes_by_row_count_then_residual() {
    let timestamps: Vec<u64> = (0..8).map(|n| n * 1_000).collect();
    let source = Arc::new(MockChainSource::linear(1, &timestamps));
    let sink = Arc::new(MemorySink::new());
    let config = BackfillConfig {
        flush: FlushPolicy { max_rows: 3, max_age: Duration::from_secs(3_600) },
        ..explicit(1, 8)
    };

    let summary = walker(&source, &sink, ChainKind::Consensus, config)
        .run(CancellationToken::new())
        .await
        .unwrap();

    let sizes: Vec<_> = sink.block_batches(ChainKind::Consensus).iter().map(Vec::len).collect();
    assert_eq!(sizes, [3, 3, 1]);
    assert_eq!(summary.batches, 3);
}

#[tokio::test]
async fn test_consensus_rows_count_events() {
    use cadence_chain::BlockEvent;

    let source = Arc::new(MockChainSource::linear(1, &[1_000, 2_000]));
    source.set_events(
        2,
        vec![
            BlockEvent::SegmentHeaderStored { segment_index: 4 },
            BlockEvent::BundleStored { domain_id: 0, bundle_hash: B256::ZERO },
            BlockEvent::BundleStored { domain_id: 0, bundle_hash: B256::ZERO },
        ],
    );
    let sink = Arc::new(MemorySink::new());

    walker(&source, &sink, ChainKind::Consensus, explicit(1, 2))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let rows = sink.block_rows(ChainKind::Consensus);
    assert_eq!(
        rows[0].extension,
        BlockExtension::Consensus { contains_segment_header: true, bundle_count: 2 }
    );
}

#[tokio::test]
async fn test_auto_evm_rows_carry_consensus_reference() {
    let source = Arc::new(MockChainSource::linear(1, &[1_000, 2_000, 3_000]));
    source.set_digest(2, vec![DigestItem::PreRuntime(*b"RGTR", vec![0xab; 32])]);
    let sink = Arc::new(MemorySink::new());

    walker(&source, &sink, ChainKind::AutoEvm, explicit(1, 3))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let refs: Vec<_> = sink
        .block_rows(ChainKind::AutoEvm)
        .iter()
        .map(|r| match r.extension {
            BlockExtension::AutoEvm { consensus_block_hash } => consensus_block_hash,
            BlockExtension::Consensus { .. } => panic!("consensus columns on an auto-evm row"),
        })
        .collect();
    assert_eq!(refs, [Some(B256::repeat_byte(0xab)), None]);
    assert_eq!(source.calls("events"), 0);
}

#[tokio::test]
async fn test_transient_source_errors_are_retried() {
    let mock = MockChainSource::linear(1, &[1_000, 2_000, 3_000]);
    mock.fail_next(2, SourceError::Timeout);
    let source = Arc::new(RetryingSource::new(
        mock,
        RetryConfig {
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_attempts: None,
        },
    ));
    let sink = Arc::new(MemorySink::new());

    let summary = BackfillWalker::new(
        source,
        sink.clone(),
        ChainStrategy::for_chain(ChainKind::Consensus),
        explicit(1, 3),
    )
    .run(CancellationToken::new())
    .await
    .unwrap();

    assert_eq!(summary.rows, 2);
}

#[tokio::test]
async fn test_persistence_failure_propagates() {
    let source = Arc::new(MockChainSource::linear(1, &[1_000, 2_000, 3_000]));
    let sink = Arc::new(MemorySink::new());
    sink.fail_next_writes(1);

    let err = walker(&source, &sink, ChainKind::Consensus, explicit(1, 3))
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Storage(_)));
}

#[tokio::test]
async fn test_missing_block_flushes_rows_already_built() {
    let source = Arc::new(MockChainSource::linear(1, &[1_000, 2_000, 3_000]));
    let sink = Arc::new(MemorySink::new());

    let err = walker(&source, &sink, ChainKind::Consensus, explicit(1, 5))
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Source(SourceError::BlockNumberNotFound(4))));
    assert_eq!(sink.block_rows(ChainKind::Consensus).len(), 2);
}

#[tokio::test]
async fn test_cancelled_run_stops_before_first_block() {
    let source = Arc::new(MockChainSource::linear(1, &[1_000, 2_000]));
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary =
        walker(&source, &sink, ChainKind::Consensus, explicit(1, 2)).run(cancel).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.blocks, 0);
    assert_eq!(source.calls("block_hash"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_retrying_tip_lookup() {
    let mock = MockChainSource::linear(1, &[1_000, 2_000, 3_000]);
    mock.fail_method("tip_header", SourceError::Timeout);
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

    let walker = BackfillWalker::new(
        source.clone(),
        sink,
        ChainStrategy::for_chain(ChainKind::Consensus),
        explicit(1, 3),
    );
    let trigger = cancel.clone();
    let handle = tokio::spawn(async move { walker.run(cancel).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    trigger.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(600), handle)
        .await
        .expect("backfill did not stop after cancellation")
        .unwrap()
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.range, None);
    assert!(source.inner().calls("tip_header") > 1);
    assert_eq!(source.inner().calls("block_hash"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_retrying_enrichment_and_flushes() {
    let mock = MockChainSource::linear(1, &[1_000, 2_000, 3_000, 4_000]);
    mock.fail_method("events", SourceError::Timeout);
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

    let walker = BackfillWalker::new(
        source.clone(),
        sink.clone(),
        ChainStrategy::for_chain(ChainKind::Consensus),
        explicit(1, 4),
    );
    let trigger = cancel.clone();
    let handle = tokio::spawn(async move { walker.run(cancel).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    trigger.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(600), handle)
        .await
        .expect("backfill did not stop after cancellation")
        .unwrap()
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!((summary.blocks, summary.rows), (2, 0));
    assert!(source.inner().calls("events") > 1);
    assert!(sink.block_rows(ChainKind::Consensus).is_empty());
}
