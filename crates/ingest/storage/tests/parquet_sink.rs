//! Round trips through the on-disk Parquet sink.

use alloy_primitives::B256;
use cadence_chain::ChainKind;
use cadence_storage::{
    BlockExtension, BlockRecord, Dataset, OfflineOperatorEvent, OperatorBundles, ParquetSink,
    StorageError, StorageSink,
};
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::fs::File;

const DAY_MS: u64 = 86_400_000;

fn consensus_row(number: u64, timestamp_ms: u64) -> BlockRecord {
    BlockRecord::new(
        number,
        B256::left_padding_from(&number.to_be_bytes()),
        B256::left_padding_from(&(number - 1).to_be_bytes()),
        timestamp_ms,
        1_000,
        0,
        BlockExtension::Consensus { contains_segment_header: number % 2 == 0, bundle_count: 1 },
    )
}

fn offline_row(number: u64) -> OfflineOperatorEvent {
    let bundles = OperatorBundles {
        operator_id: 11,
        domain_id: 0,
        submitted_bundles: 2,
        expected_bundles: 8,
        min_required_bundles: 4,
    };
    OfflineOperatorEvent::new(number, B256::ZERO, DAY_MS, 5, bundles, 0)
}

fn row_count(path: &std::path::Path) -> i64 {
    let reader = SerializedFileReader::new(File::open(path).unwrap()).unwrap();
    reader.metadata().file_metadata().num_rows()
}

#[tokio::test]
async fn test_block_times_partitioned_by_first_row() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ParquetSink::new(dir.path());

    // The batch straddles midnight; the whole batch lands in the first row's date.
    let rows = vec![consensus_row(101, DAY_MS - 1), consensus_row(102, DAY_MS + 5)];
    let path = sink.write_block_times(ChainKind::Consensus, rows).await.unwrap();

    let expected_dir = dir.path().join("block_times/chain=consensus/date=1970-01-01");
    assert_eq!(path.parent().unwrap(), expected_dir);
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("part-"));
    assert_eq!(row_count(&path), 2);
}

#[tokio::test]
async fn test_resume_cursor_spans_parts() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ParquetSink::new(dir.path());
    let dataset = Dataset::BlockTimes(ChainKind::Consensus);

    assert_eq!(sink.max_persisted_block_number(dataset).await.unwrap(), None);

    sink.write_block_times(ChainKind::Consensus, vec![consensus_row(500, 0)]).await.unwrap();
    sink.write_block_times(ChainKind::Consensus, vec![consensus_row(90, DAY_MS * 3)])
        .await
        .unwrap();
    sink.write_block_times(ChainKind::Consensus, vec![consensus_row(7, DAY_MS)]).await.unwrap();

    assert_eq!(sink.max_persisted_block_number(dataset).await.unwrap(), Some(500));
    assert_eq!(
        sink.max_persisted_block_number(Dataset::BlockTimes(ChainKind::AutoEvm)).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_rapid_writes_never_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ParquetSink::new(dir.path());

    let mut paths = Vec::new();
    for n in 1..=5 {
        paths.push(sink.write_offline_operators(vec![offline_row(n)]).await.unwrap());
    }
    paths.sort();
    paths.dedup();

    assert_eq!(paths.len(), 5);
    assert_eq!(
        sink.max_persisted_block_number(Dataset::OfflineOperators).await.unwrap(),
        Some(5)
    );
}

#[tokio::test]
async fn test_rejects_invalid_batches() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ParquetSink::new(dir.path());

    let empty = sink.write_block_times(ChainKind::AutoEvm, Vec::new()).await;
    assert!(matches!(empty, Err(StorageError::EmptyBatch)));

    let foreign = sink.write_block_times(ChainKind::AutoEvm, vec![consensus_row(3, 0)]).await;
    assert!(matches!(foreign, Err(StorageError::MixedChains { .. })));

    let empty_offline = sink.write_offline_operators(Vec::new()).await;
    assert!(matches!(empty_offline, Err(StorageError::EmptyBatch)));

    assert!(!dir.path().join("block_times").exists());
}

#[tokio::test]
async fn test_unreadable_part_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let partition = dir.path().join("offline_operators/date=1970-01-01");
    std::fs::create_dir_all(&partition).unwrap();
    std::fs::write(partition.join("part-1.parquet"), b"not parquet").unwrap();

    let sink = ParquetSink::new(dir.path());
    assert!(sink.max_persisted_block_number(Dataset::OfflineOperators).await.is_err());
}
