//! An in-memory [`StorageSink`] for tests.

use crate::{
    BlockRecord, Dataset, OfflineOperatorEvent, StorageError, StorageResult, StorageSink,
    layout::{part_file_name, partition_date},
    validate_block_batch,
};
use async_trait::async_trait;
use cadence_chain::ChainKind;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

/// Root used for the paths reported by [`MemorySink`].
pub const MEMORY_ROOT: &str = "memory";

#[derive(Debug, Default)]
struct MemoryState {
    block_batches: Vec<(ChainKind, Vec<BlockRecord>)>,
    offline_batches: Vec<Vec<OfflineOperatorEvent>>,
    paths: Vec<PathBuf>,
    cursors: HashMap<Dataset, u64>,
    failing_writes: usize,
    failing_resume: bool,
    resume_calls: usize,
}

/// Records every batch it receives.
///
/// Resume cursors are the maximum of any seeded cursor and the rows written so far. Writes and
/// resume lookups can be made to fail.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the persisted maximum block number of `dataset`.
    pub fn with_cursor(self, dataset: Dataset, block_number: u64) -> Self {
        self.lock().cursors.insert(dataset, block_number);
        self
    }

    /// Fails the next `count` writes.
    pub fn fail_next_writes(&self, count: usize) {
        self.lock().failing_writes = count;
    }

    /// Makes every resume lookup fail.
    pub fn fail_resume(&self) {
        self.lock().failing_resume = true;
    }

    /// The block time batches written for `chain`, in write order.
    pub fn block_batches(&self, chain: ChainKind) -> Vec<Vec<BlockRecord>> {
        self.lock()
            .block_batches
            .iter()
            .filter(|(c, _)| *c == chain)
            .map(|(_, rows)| rows.clone())
            .collect()
    }

    /// Every block time row written for `chain`.
    pub fn block_rows(&self, chain: ChainKind) -> Vec<BlockRecord> {
        self.block_batches(chain).into_iter().flatten().collect()
    }

    /// The offline operator batches written, in write order.
    pub fn offline_batches(&self) -> Vec<Vec<OfflineOperatorEvent>> {
        self.lock().offline_batches.clone()
    }

    /// The paths reported for each write, in write order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().paths.clone()
    }

    /// Number of resume lookups served, including failed ones.
    pub fn resume_calls(&self) -> usize {
        self.lock().resume_calls
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    fn record(
        state: &mut MemoryState,
        dataset: Dataset,
        first_timestamp_ms: u64,
    ) -> StorageResult<PathBuf> {
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(StorageError::io(MEMORY_ROOT, std::io::Error::other("injected failure")));
        }
        let dir = dataset.partition_dir(Path::new(MEMORY_ROOT), partition_date(first_timestamp_ms)?);
        let path = dir.join(part_file_name(state.paths.len() as u64));
        state.paths.push(path.clone());
        Ok(path)
    }
}

#[async_trait]
impl StorageSink for MemorySink {
    async fn write_block_times(
        &self,
        chain: ChainKind,
        rows: Vec<BlockRecord>,
    ) -> StorageResult<PathBuf> {
        validate_block_batch(chain, &rows)?;
        let mut state = self.lock();
        let path = Self::record(&mut state, Dataset::BlockTimes(chain), rows[0].timestamp_ms)?;
        state.block_batches.push((chain, rows));
        Ok(path)
    }

    async fn write_offline_operators(
        &self,
        rows: Vec<OfflineOperatorEvent>,
    ) -> StorageResult<PathBuf> {
        let first = rows.first().ok_or(StorageError::EmptyBatch)?.timestamp_ms;
        let mut state = self.lock();
        let path = Self::record(&mut state, Dataset::OfflineOperators, first)?;
        state.offline_batches.push(rows);
        Ok(path)
    }

    async fn max_persisted_block_number(&self, dataset: Dataset) -> StorageResult<Option<u64>> {
        let mut state = self.lock();
        state.resume_calls += 1;
        if state.failing_resume {
            return Err(StorageError::Task("injected resume failure".to_string()));
        }

        let written = match dataset {
            Dataset::BlockTimes(chain) => state
                .block_batches
                .iter()
                .filter(|(c, _)| *c == chain)
                .flat_map(|(_, rows)| rows.iter().map(|r| r.block_number))
                .max(),
            Dataset::OfflineOperators => {
                state.offline_batches.iter().flatten().map(|r| r.block_number).max()
            }
        };
        Ok(written.max(state.cursors.get(&dataset).copied()))
    }
}
