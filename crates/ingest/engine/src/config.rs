//! Run configuration of the ingestion drivers.

use crate::{EnrichmentMode, FlushPolicy};
use cadence_chain::RetryConfig;
use std::time::Duration;

/// Default number of blocks a backfill covers below the confirmed tip.
pub const DEFAULT_BACKFILL_WINDOW: u64 = 5_000;

/// Default number of blocks between backfill progress logs.
pub const DEFAULT_BACKFILL_PROGRESS_INTERVAL: u64 = 500;

/// Default number of scanned blocks between offline scan progress logs.
pub const DEFAULT_OFFLINE_PROGRESS_INTERVAL: u64 = 10_000;

/// Default row count that flushes an offline operator batch.
pub const DEFAULT_OFFLINE_FLUSH_ROWS: usize = 10;

/// Default interval at which a stream re-checks the age of its buffer.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration of a block time backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillConfig {
    /// First block to ingest. Disables resuming when set.
    pub start: Option<u64>,
    /// Last block to ingest. Defaults to the confirmed tip.
    pub end: Option<u64>,
    /// Blocks below the confirmed tip covered when no start is given.
    pub window: u64,
    /// Log progress every this many blocks.
    pub progress_interval: u64,
    /// Batch flush policy.
    pub flush: FlushPolicy,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            window: DEFAULT_BACKFILL_WINDOW,
            progress_interval: DEFAULT_BACKFILL_PROGRESS_INTERVAL,
            flush: FlushPolicy::default(),
        }
    }
}

/// Configuration of an offline operator scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfflineConfig {
    /// First block to scan. Disables resuming when set; otherwise scanning starts at block 1.
    pub start: Option<u64>,
    /// Last block to scan. Defaults to the confirmed tip.
    pub end: Option<u64>,
    /// Blocks behind the tip considered safe from reversal.
    pub confirmation_depth: u64,
    /// Log progress every this many scanned blocks.
    pub progress_interval: u64,
    /// Batch flush policy.
    pub flush: FlushPolicy,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            confirmation_depth: crate::DEFAULT_CONFIRMATION_DEPTH,
            progress_interval: DEFAULT_OFFLINE_PROGRESS_INTERVAL,
            flush: FlushPolicy { max_rows: DEFAULT_OFFLINE_FLUSH_ROWS, ..Default::default() },
        }
    }
}

/// Configuration of a live head stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Batch flush policy.
    pub flush: FlushPolicy,
    /// How often the buffer age is checked between heads.
    pub tick_interval: Duration,
    /// Whether heads are enriched from events or from the header alone.
    pub mode: EnrichmentMode,
    /// Backoff used when re-subscribing to new heads.
    pub resubscribe: RetryConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            flush: FlushPolicy::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            mode: EnrichmentMode::HeadOnly,
            resubscribe: RetryConfig::default(),
        }
    }
}
