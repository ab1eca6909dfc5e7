//! Stream Subcommand

use crate::flags::GlobalArgs;
use cadence_chain::ChainKind;
use cadence_engine::{StreamSubscriber, stream_chains};
use cadence_storage::ParquetSink;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The `stream` Subcommand
///
/// Follows the new heads of every selected chain and records the time between consecutive
/// blocks until interrupted.
///
/// # Usage
///
/// ```sh
/// ingest stream [--chains=consensus,auto-evm]
/// ```
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(about = "Streams block times of new heads until interrupted")]
pub struct StreamCommand {
    /// Chains to stream, comma separated. Defaults to every known chain.
    #[arg(long, value_delimiter = ',')]
    pub chains: Vec<ChainKind>,
}

impl StreamCommand {
    /// The selected chains in canonical order, without duplicates.
    pub fn selected_chains(&self) -> Vec<ChainKind> {
        if self.chains.is_empty() {
            return ChainKind::ALL.to_vec();
        }
        let mut chains = self.chains.clone();
        chains.sort();
        chains.dedup();
        chains
    }

    /// Runs the subcommand.
    pub async fn run(self, args: &GlobalArgs, cancel: CancellationToken) -> anyhow::Result<()> {
        let sink = Arc::new(ParquetSink::new(&args.data_dir));
        let config = args.stream_config();

        let mut subscribers = Vec::new();
        for chain in self.selected_chains() {
            let Some(source) = args.rpc.connect(chain, &cancel).await? else {
                continue;
            };
            subscribers.push(StreamSubscriber::new(source, Arc::clone(&sink), chain, config));
        }
        if subscribers.is_empty() {
            warn!(target: "ingest", "No chain to stream");
            return Ok(());
        }

        info!(target: "ingest", chains = subscribers.len(), data_dir = %args.data_dir.display(), "Streaming");
        for (chain, summary) in stream_chains(subscribers, cancel).await? {
            info!(
                target: "ingest",
                %chain,
                heads = summary.heads,
                rows = summary.rows,
                anomalies = summary.anomalies,
                batches = summary.batches,
                "Stream stopped"
            );
        }
        Ok(())
    }
}
