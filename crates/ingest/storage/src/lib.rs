//! Persistence for cadence ingestion rows.
//!
//! Rows are written as one Parquet file per flushed batch, partitioned by chain and calendar
//! date, under a data directory:
//!
//! ```text
//! {data_dir}/block_times/chain={chain}/date={yyyy-mm-dd}/part-{unix_ms}.parquet
//! {data_dir}/offline_operators/date={yyyy-mm-dd}/part-{unix_ms}.parquet
//! ```
//!
//! The engine only talks to the [`StorageSink`] trait. Besides persisting batches, a sink can
//! report the highest block number it already holds for a dataset, which is how interrupted
//! backfills resume.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

pub mod models;
pub use models::{
    BlockExtension, BlockRecord, OfflineOperatorEvent, OperatorBundles, iso8601_utc, shortfall_pct,
    unix_time_ms,
};

mod error;
pub use error::{StorageError, StorageResult};

pub mod layout;
pub use layout::Dataset;

mod traits;
pub use traits::{StorageSink, validate_block_batch};

#[cfg(any(test, feature = "test-utils"))]
pub use traits::MockStorageSink;

mod parquet;
pub use parquet::ParquetSink;

mod schema;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
