//! The storage seam consumed by the ingestion engine.

use crate::{BlockRecord, Dataset, OfflineOperatorEvent, StorageError, StorageResult};
use async_trait::async_trait;
use cadence_chain::ChainKind;
use std::{fmt::Debug, path::PathBuf};

/// Persists flushed batches and reports resume cursors.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait StorageSink: Debug + Send + Sync {
    /// Persists a block time batch of `chain` as one part file, partitioned by the date of the
    /// first row. Returns the written file.
    async fn write_block_times(
        &self,
        chain: ChainKind,
        rows: Vec<BlockRecord>,
    ) -> StorageResult<PathBuf>;

    /// Persists an offline operator batch as one part file, partitioned by the date of the
    /// first row. Returns the written file.
    async fn write_offline_operators(
        &self,
        rows: Vec<OfflineOperatorEvent>,
    ) -> StorageResult<PathBuf>;

    /// The highest block number persisted in `dataset`, or `None` if it holds no rows.
    async fn max_persisted_block_number(&self, dataset: Dataset) -> StorageResult<Option<u64>>;
}

/// Checks that `rows` is a non-empty batch of `chain` rows.
pub fn validate_block_batch(chain: ChainKind, rows: &[BlockRecord]) -> StorageResult<()> {
    if rows.is_empty() {
        return Err(StorageError::EmptyBatch);
    }
    match rows.iter().find(|row| row.chain() != chain) {
        Some(row) => Err(StorageError::MixedChains { expected: chain, found: row.chain() }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockExtension;
    use alloy_primitives::B256;

    fn row(extension: BlockExtension) -> BlockRecord {
        BlockRecord::new(1, B256::ZERO, B256::ZERO, 0, 0, 0, extension)
    }

    #[test]
    fn test_validate_empty() {
        assert!(matches!(
            validate_block_batch(ChainKind::Consensus, &[]),
            Err(StorageError::EmptyBatch)
        ));
    }

    #[test]
    fn test_validate_mixed() {
        let rows = [
            row(BlockExtension::Consensus { contains_segment_header: false, bundle_count: 0 }),
            row(BlockExtension::AutoEvm { consensus_block_hash: None }),
        ];
        assert!(matches!(
            validate_block_batch(ChainKind::Consensus, &rows),
            Err(StorageError::MixedChains {
                expected: ChainKind::Consensus,
                found: ChainKind::AutoEvm
            })
        ));
    }

    #[tokio::test]
    async fn test_mock_sink_reports_cursor() {
        let mut sink = MockStorageSink::new();
        sink.expect_max_persisted_block_number()
            .withf(|dataset| *dataset == Dataset::OfflineOperators)
            .returning(|_| Ok(Some(41)));

        let cursor = sink.max_persisted_block_number(Dataset::OfflineOperators).await.unwrap();
        assert_eq!(cursor, Some(41));
    }
}
