//! Backfill Subcommand

use crate::flags::GlobalArgs;
use cadence_chain::ChainKind;
use cadence_engine::{BackfillConfig, BackfillWalker, ChainStrategy};
use cadence_storage::ParquetSink;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The `backfill` Subcommand
///
/// Walks a block range of one chain and records the time between consecutive blocks. Without
/// `--start` the walk resumes after the highest persisted block, or covers the last 5000
/// confirmed blocks when nothing was persisted yet.
///
/// # Usage
///
/// ```sh
/// ingest backfill [--chain=auto-evm] [--start=100] [--end=200] [--K=64]
/// ```
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(about = "Backfills block times of a block range")]
pub struct BackfillCommand {
    /// The chain to backfill.
    #[arg(long, default_value = "consensus")]
    pub chain: ChainKind,
    /// First block to ingest.
    #[arg(long)]
    pub start: Option<u64>,
    /// Last block to ingest. Defaults to the confirmed tip.
    #[arg(long)]
    pub end: Option<u64>,
    /// Confirmation depth, overriding the chain's configured depth.
    #[arg(long = "K", visible_alias = "k")]
    pub confirmation_depth: Option<u64>,
}

impl BackfillCommand {
    /// The strategy of the selected chain.
    pub fn strategy(&self, args: &GlobalArgs) -> ChainStrategy {
        let depth = self.confirmation_depth.unwrap_or_else(|| args.confirmation_depth(self.chain));
        ChainStrategy::for_chain(self.chain).with_confirmation_depth(depth)
    }

    /// The walk configuration, preferring this subcommand's bounds over the global ones.
    pub fn config(&self, args: &GlobalArgs) -> BackfillConfig {
        BackfillConfig {
            start: self.start.or(args.backfill_start),
            end: self.end.or(args.backfill_end),
            flush: args.flush_policy(),
            ..Default::default()
        }
    }

    /// Runs the subcommand.
    pub async fn run(self, args: &GlobalArgs, cancel: CancellationToken) -> anyhow::Result<()> {
        let Some(source) = args.rpc.connect(self.chain, &cancel).await? else {
            return Ok(());
        };
        let sink = Arc::new(ParquetSink::new(&args.data_dir));
        let walker = BackfillWalker::new(source, sink, self.strategy(args), self.config(args));

        let summary = walker.run(cancel).await?;
        info!(
            target: "ingest",
            chain = %self.chain,
            range = ?summary.range,
            blocks = summary.blocks,
            rows = summary.rows,
            anomalies = summary.anomalies,
            batches = summary.batches,
            cancelled = summary.cancelled,
            "Backfill finished"
        );
        Ok(())
    }
}
