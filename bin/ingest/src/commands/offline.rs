//! Backfill-offline Subcommand

use crate::flags::GlobalArgs;
use cadence_chain::ChainKind;
use cadence_engine::{FlushPolicy, OfflineBackfill, OfflineConfig};
use cadence_storage::ParquetSink;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The `backfill-offline` Subcommand
///
/// Scans consensus blocks for domain epoch transitions and records every operator that
/// submitted fewer bundles than required.
///
/// # Usage
///
/// ```sh
/// ingest backfill-offline [--start=1] [--end=100000]
/// ```
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(about = "Backfills offline operators from epoch transitions")]
pub struct OfflineCommand {
    /// First block to scan. Defaults to resuming, or block 1.
    #[arg(long)]
    pub start: Option<u64>,
    /// Last block to scan. Defaults to the confirmed tip.
    #[arg(long)]
    pub end: Option<u64>,
}

impl OfflineCommand {
    /// The scan configuration, preferring this subcommand's bounds over the global ones.
    pub fn config(&self, args: &GlobalArgs) -> OfflineConfig {
        let defaults = OfflineConfig::default();
        OfflineConfig {
            start: self.start.or(args.backfill_start),
            end: self.end.or(args.backfill_end),
            confirmation_depth: args.confirmation_depth(ChainKind::Consensus),
            flush: FlushPolicy {
                max_age: args.flush_policy().max_age,
                ..defaults.flush
            },
            ..defaults
        }
    }

    /// Runs the subcommand.
    pub async fn run(self, args: &GlobalArgs, cancel: CancellationToken) -> anyhow::Result<()> {
        let Some(source) = args.rpc.connect(ChainKind::Consensus, &cancel).await? else {
            return Ok(());
        };
        let sink = Arc::new(ParquetSink::new(&args.data_dir));
        let scan = OfflineBackfill::new(source, sink, self.config(args));

        let summary = scan.run(cancel).await?;
        info!(
            target: "ingest",
            range = ?summary.range,
            blocks = summary.blocks,
            epoch_blocks = summary.epoch_blocks,
            rows = summary.rows,
            batches = summary.batches,
            cancelled = summary.cancelled,
            "Offline operator backfill finished"
        );
        Ok(())
    }
}
