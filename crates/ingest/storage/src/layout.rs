//! Partition layout of the data directory.

use crate::{StorageError, StorageResult};
use cadence_chain::ChainKind;
use chrono::{DateTime, NaiveDate};
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Directory holding block time partitions.
pub const BLOCK_TIMES_DIR: &str = "block_times";

/// Directory holding offline operator partitions.
pub const OFFLINE_OPERATORS_DIR: &str = "offline_operators";

/// A persisted dataset, addressed independently of its on-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// Block time rows of one chain.
    BlockTimes(ChainKind),
    /// Offline operator rows.
    OfflineOperators,
}

impl Dataset {
    /// The dataset directory under `data_dir`, above the date partitions.
    pub fn root(&self, data_dir: &Path) -> PathBuf {
        match self {
            Self::BlockTimes(chain) => data_dir.join(BLOCK_TIMES_DIR).join(format!("chain={chain}")),
            Self::OfflineOperators => data_dir.join(OFFLINE_OPERATORS_DIR),
        }
    }

    /// The directory of the partition holding rows dated `date`.
    pub fn partition_dir(&self, data_dir: &Path, date: NaiveDate) -> PathBuf {
        self.root(data_dir).join(format!("date={}", date.format("%Y-%m-%d")))
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockTimes(chain) => write!(f, "{BLOCK_TIMES_DIR}/chain={chain}"),
            Self::OfflineOperators => f.write_str(OFFLINE_OPERATORS_DIR),
        }
    }
}

/// The UTC calendar date of a millisecond timestamp.
pub fn partition_date(timestamp_ms: u64) -> StorageResult<NaiveDate> {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|ts| ts.date_naive())
        .ok_or(StorageError::InvalidTimestamp(timestamp_ms))
}

/// The file name of a part written at `unix_ms`.
pub fn part_file_name(unix_ms: u64) -> String {
    format!("part-{unix_ms}.parquet")
}
