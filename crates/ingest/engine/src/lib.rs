//! # cadence-engine
//!
//! The ingestion core of cadence. It walks or follows the blocks of a chain, tracks parent
//! linkage to measure the time between consecutive blocks, enriches every linked transition
//! with chain-specific columns, and hands rows to a [`StorageSink`] in size or age bounded
//! batches.
//!
//! ## Drivers
//!
//! - [`BackfillWalker`]: a bounded, resumable range scan of one chain.
//! - [`OfflineBackfill`]: a range scan of consensus epoch transitions recording offline
//!   operators.
//! - [`StreamSubscriber`]: an unbounded follower of one chain's new heads. [`stream_chains`]
//!   runs several concurrently.
//!
//! Every driver owns its [`LinkageTracker`] and [`BatchBuffer`], takes a
//! [`CancellationToken`], and flushes buffered rows before it returns.
//!
//! [`StorageSink`]: cadence_storage::StorageSink
//! [`CancellationToken`]: tokio_util::sync::CancellationToken
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod cancel;

mod error;
pub use error::{IngestError, IngestResult};

mod linkage;
pub use linkage::{Linkage, LinkageTracker};

mod enrichment;
pub use enrichment::{
    CONSENSUS_BLOCK_ENGINE_ID, Enricher, EnrichmentMode, OfflineOperator, auto_evm_extension,
    consensus_block_hash, consensus_extension, epoch_completions, offline_operators,
};

mod strategy;
pub use strategy::{ChainStrategy, DEFAULT_CONFIRMATION_DEPTH};

mod buffer;
pub use buffer::{BatchBuffer, DEFAULT_FLUSH_INTERVAL, DEFAULT_FLUSH_ROWS, FlushPolicy};

mod config;
pub use config::{
    BackfillConfig, DEFAULT_BACKFILL_PROGRESS_INTERVAL, DEFAULT_BACKFILL_WINDOW,
    DEFAULT_OFFLINE_FLUSH_ROWS, DEFAULT_OFFLINE_PROGRESS_INTERVAL, DEFAULT_TICK_INTERVAL,
    OfflineConfig, StreamConfig,
};

mod range;
pub use range::{RangeRequest, plan_range};

mod resume;
pub use resume::ResumeResolver;

mod backfill;
pub use backfill::{BackfillSummary, BackfillWalker};

mod offline;
pub use offline::{OfflineBackfill, OfflineSummary};

mod stream;
pub use stream::{StreamSubscriber, StreamSummary, stream_chains};

mod metrics;
pub use metrics::describe_ingest_metrics;
