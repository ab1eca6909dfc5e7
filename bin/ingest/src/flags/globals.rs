//! Global arguments for the CLI.

use crate::flags::RpcArgs;
use cadence_chain::ChainKind;
use cadence_cli::{LogArgs, MetricsArgs};
use cadence_engine::{DEFAULT_CONFIRMATION_DEPTH, EnrichmentMode, FlushPolicy, StreamConfig};
use clap::Args;
use std::{path::PathBuf, time::Duration};

/// Global arguments for the CLI.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    /// Logging arguments.
    #[command(flatten)]
    pub log_args: LogArgs,
    /// Prometheus CLI arguments.
    #[command(flatten)]
    pub metrics: MetricsArgs,
    /// Chain RPC arguments.
    #[command(flatten)]
    pub rpc: RpcArgs,
    /// Directory persisted batches are written under.
    #[arg(long = "data-dir", env = "DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,
    /// Number of buffered rows that triggers a write.
    #[arg(long = "write-batch-rows", env = "WRITE_BATCH_ROWS", default_value_t = 5_000, global = true)]
    pub write_batch_rows: usize,
    /// Milliseconds since the last write after which buffered rows are written.
    #[arg(long = "write-batch-ms", env = "WRITE_BATCH_MS", default_value_t = 60_000, global = true)]
    pub write_batch_ms: u64,
    /// Confirmation depth of the consensus chain, in blocks.
    #[arg(
        long = "k-consensus",
        env = "K_CONSENSUS",
        default_value_t = DEFAULT_CONFIRMATION_DEPTH,
        global = true
    )]
    pub k_consensus: u64,
    /// Confirmation depth of the auto-evm chain, in blocks.
    #[arg(
        long = "k-auto-evm",
        env = "K_AUTO_EVM",
        default_value_t = DEFAULT_CONFIRMATION_DEPTH,
        global = true
    )]
    pub k_auto_evm: u64,
    /// First block of a backfill. Subcommand `--start` takes precedence.
    #[arg(long = "backfill-start", env = "BACKFILL_START", global = true)]
    pub backfill_start: Option<u64>,
    /// Last block of a backfill. Subcommand `--end` takes precedence.
    #[arg(long = "backfill-end", env = "BACKFILL_END", global = true)]
    pub backfill_end: Option<u64>,
    /// Enrich streamed consensus heads from block events instead of the header alone.
    #[arg(
        long = "stream-event-enrichment",
        env = "STREAM_EVENT_ENRICHMENT",
        default_value_t = false,
        global = true
    )]
    pub stream_event_enrichment: bool,
}

impl GlobalArgs {
    /// The flush policy of block time batches.
    pub const fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            max_rows: self.write_batch_rows,
            max_age: Duration::from_millis(self.write_batch_ms),
        }
    }

    /// The confirmation depth of `chain`.
    pub const fn confirmation_depth(&self, chain: ChainKind) -> u64 {
        match chain {
            ChainKind::Consensus => self.k_consensus,
            ChainKind::AutoEvm => self.k_auto_evm,
        }
    }

    /// The configuration shared by every stream subscriber.
    pub fn stream_config(&self) -> StreamConfig {
        let mode =
            if self.stream_event_enrichment { EnrichmentMode::Full } else { EnrichmentMode::HeadOnly };
        StreamConfig {
            flush: self.flush_policy(),
            mode,
            resubscribe: self.rpc.retry_config(),
            ..Default::default()
        }
    }
}
