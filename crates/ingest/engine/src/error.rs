//! Engine errors.

use cadence_chain::{ChainKind, SourceError};
use cadence_storage::StorageError;
use thiserror::Error;

/// A result returned by the ingestion engine.
pub type IngestResult<T> = Result<T, IngestError>;

/// An error that stops an ingestion run.
///
/// Linkage anomalies and empty ranges are not errors; they are logged and counted in the run
/// summary instead.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The chain source failed, after retries where applicable.
    #[error("chain source error: {0}")]
    Source(#[from] SourceError),
    /// Persisting a batch failed. The rows of that batch are not guaranteed to be stored.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// The source for this chain cannot supply decoded runtime events.
    #[error("chain source for {0} cannot supply runtime events")]
    EventsUnavailable(ChainKind),
    /// An ingestion task panicked or was aborted.
    #[error("ingestion task failed: {0}")]
    Task(String),
}
