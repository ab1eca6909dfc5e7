//! Storage errors.

use cadence_chain::ChainKind;
use std::path::PathBuf;
use thiserror::Error;

/// A result returned by a [`StorageSink`](crate::StorageSink).
pub type StorageResult<T> = Result<T, StorageError>;

/// An error raised while persisting or reading back ingestion rows.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write was requested with no rows.
    #[error("refusing to write an empty batch")]
    EmptyBatch,
    /// A block time batch contained a row of another chain.
    #[error("batch for chain {expected} contains a row of chain {found}")]
    MixedChains {
        /// The partition the batch was written to.
        expected: ChainKind,
        /// The chain of the offending row.
        found: ChainKind,
    },
    /// A filesystem operation failed.
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Building a record batch failed.
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
    /// Encoding or decoding a parquet file failed.
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
    /// The resume glob could not be built.
    #[error("invalid partition pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    /// A part file lacks a readable column.
    #[error("column {column} is missing or has an unexpected type in {}", path.display())]
    Column {
        /// The column name.
        column: &'static str,
        /// The part file.
        path: PathBuf,
    },
    /// The blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),
    /// A row timestamp cannot be mapped to a calendar date.
    #[error("timestamp {0} ms is out of range")]
    InvalidTimestamp(u64),
}

impl StorageError {
    /// Wraps an [`std::io::Error`] raised at `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
