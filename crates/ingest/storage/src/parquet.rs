//! A [`StorageSink`] writing date-partitioned Parquet files.

use crate::{
    BlockRecord, Dataset, OfflineOperatorEvent, StorageError, StorageResult, StorageSink,
    layout::{part_file_name, partition_date},
    schema::{self, BLOCK_NUMBER},
    unix_time_ms, validate_block_batch,
};
use arrow::{array::AsArray, datatypes::UInt64Type, record_batch::RecordBatch};
use async_trait::async_trait;
use cadence_chain::ChainKind;
use parquet::{
    arrow::{ArrowWriter, ProjectionMask, arrow_reader::ParquetRecordBatchReaderBuilder},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Writes each batch as `part-{unix_ms}.parquet` below its dataset's date partition.
///
/// Part files are created with create-new semantics. When the current millisecond is taken the
/// name is bumped until a free one is found, so existing parts are never overwritten.
#[derive(Debug, Clone)]
pub struct ParquetSink {
    data_dir: PathBuf,
}

impl ParquetSink {
    /// Creates a sink rooted at `data_dir`. Directories are created on first write.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    /// The root data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn write(
        &self,
        dataset: Dataset,
        first_timestamp_ms: u64,
        batch: RecordBatch,
    ) -> StorageResult<PathBuf> {
        let dir = dataset.partition_dir(&self.data_dir, partition_date(first_timestamp_ms)?);
        let rows = batch.num_rows();
        let path = tokio::task::spawn_blocking(move || write_part(&dir, &batch))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;

        info!(target: "parquet_sink", %dataset, rows, path = %path.display(), "Wrote batch");
        Ok(path)
    }
}

#[async_trait]
impl StorageSink for ParquetSink {
    async fn write_block_times(
        &self,
        chain: ChainKind,
        rows: Vec<BlockRecord>,
    ) -> StorageResult<PathBuf> {
        validate_block_batch(chain, &rows)?;
        let batch = schema::block_times_batch(chain, &rows)?;
        self.write(Dataset::BlockTimes(chain), rows[0].timestamp_ms, batch).await
    }

    async fn write_offline_operators(
        &self,
        rows: Vec<OfflineOperatorEvent>,
    ) -> StorageResult<PathBuf> {
        let Some(first) = rows.first() else {
            return Err(StorageError::EmptyBatch);
        };
        let first_timestamp_ms = first.timestamp_ms;
        let batch = schema::offline_operators_batch(&rows)?;
        self.write(Dataset::OfflineOperators, first_timestamp_ms, batch).await
    }

    async fn max_persisted_block_number(&self, dataset: Dataset) -> StorageResult<Option<u64>> {
        let root = dataset.root(&self.data_dir);
        let max = tokio::task::spawn_blocking(move || max_block_number(&root))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;

        debug!(target: "parquet_sink", %dataset, ?max, "Scanned persisted parts");
        Ok(max)
    }
}

fn write_part(dir: &Path, batch: &RecordBatch) -> StorageResult<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;

    let (path, file) = create_part_file(dir, unix_time_ms())?;

    let props = WriterProperties::builder().set_compression(Compression::SNAPPY).build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(path)
}

/// Opens a new part file in `dir`, starting from `unix_ms` and bumping on collision.
fn create_part_file(dir: &Path, mut unix_ms: u64) -> StorageResult<(PathBuf, File)> {
    loop {
        let path = dir.join(part_file_name(unix_ms));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => unix_ms += 1,
            Err(err) => return Err(StorageError::io(path, err)),
        }
    }
}

fn max_block_number(root: &Path) -> StorageResult<Option<u64>> {
    let pattern =
        format!("{}/date=*/part-*.parquet", glob::Pattern::escape(&root.to_string_lossy()));

    let mut max = None;
    for entry in glob::glob(&pattern)? {
        let path = entry.map_err(|e| StorageError::io(e.path().to_path_buf(), e.into_error()))?;
        max = max.max(part_max_block_number(&path)?);
    }
    Ok(max)
}

/// Reads only the block number column of one part file.
fn part_max_block_number(path: &Path) -> StorageResult<Option<u64>> {
    let column_error = || StorageError::Column { column: BLOCK_NUMBER, path: path.to_path_buf() };

    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let leaf = builder
        .parquet_schema()
        .columns()
        .iter()
        .position(|column| column.name() == BLOCK_NUMBER)
        .ok_or_else(column_error)?;
    let mask = ProjectionMask::leaves(builder.parquet_schema(), [leaf]);

    let mut max = None;
    for batch in builder.with_projection(mask).build()? {
        let batch = batch?;
        let numbers = batch.column(0).as_primitive_opt::<UInt64Type>().ok_or_else(column_error)?;
        max = max.max(arrow::compute::max(numbers));
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_part_file_bumps_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _) = create_part_file(dir.path(), 1_000).unwrap();
        let (second, _) = create_part_file(dir.path(), 1_000).unwrap();

        assert_eq!(first.file_name().unwrap(), "part-1000.parquet");
        assert_eq!(second.file_name().unwrap(), "part-1001.parquet");
    }

    #[test]
    fn test_max_block_number_of_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(max_block_number(&dir.path().join("nothing")).unwrap(), None);
    }
}
