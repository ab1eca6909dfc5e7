//! Chain RPC endpoint and retry flags.

use backon::Retryable;
use cadence_chain::{ChainKind, RetryConfig, RetryingSource, RpcChainSource, SourceError};
use clap::Args;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use url::Url;

/// The chain source every command ingests from.
pub type IngestSource = RetryingSource<RpcChainSource>;

/// Chain RPC arguments.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RpcArgs {
    /// WebSocket RPC endpoint of the consensus chain.
    #[arg(long = "consensus-rpc", env = "CONSENSUS_RPC_WS")]
    pub consensus_rpc: Url,
    /// WebSocket RPC endpoint of the auto-evm chain. Auto-evm pipelines are skipped without it.
    #[arg(long = "auto-evm-rpc", env = "AUTO_EVM_RPC_WS", global = true)]
    pub auto_evm_rpc: Option<Url>,
    /// Delay before the first retry of a failed RPC call, in milliseconds.
    #[arg(long = "rpc-retry-min-ms", env = "RPC_RETRY_MIN_MS", default_value_t = 500, global = true)]
    pub retry_min_ms: u64,
    /// Upper bound on the delay between RPC retries, in milliseconds.
    #[arg(
        long = "rpc-retry-max-ms",
        env = "RPC_RETRY_MAX_MS",
        default_value_t = 30_000,
        global = true
    )]
    pub retry_max_ms: u64,
    /// Maximum retries of a failed RPC call. Retries forever when unset.
    #[arg(long = "rpc-retry-max-attempts", env = "RPC_RETRY_MAX_ATTEMPTS", global = true)]
    pub retry_max_attempts: Option<usize>,
    /// Timeout of a single RPC request, in seconds.
    #[arg(long = "rpc-timeout-secs", env = "RPC_TIMEOUT_SECS", default_value_t = 60, global = true)]
    pub timeout_secs: u64,
}

impl RpcArgs {
    /// The backoff applied to transient RPC failures.
    pub const fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            min_delay: Duration::from_millis(self.retry_min_ms),
            max_delay: Duration::from_millis(self.retry_max_ms),
            max_attempts: self.retry_max_attempts,
        }
    }

    /// The endpoint of `chain`, if one is configured.
    pub const fn endpoint(&self, chain: ChainKind) -> Option<&Url> {
        match chain {
            ChainKind::Consensus => Some(&self.consensus_rpc),
            ChainKind::AutoEvm => self.auto_evm_rpc.as_ref(),
        }
    }

    /// Connects to the node of `chain`, retrying transient connection failures.
    ///
    /// Returns `None` when the chain has no endpoint configured, or when `cancel` fires before
    /// the connection is up.
    pub async fn connect(
        &self,
        chain: ChainKind,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Option<Arc<IngestSource>>> {
        let Some(url) = self.endpoint(chain) else {
            warn!(target: "ingest", %chain, "No RPC endpoint configured, skipping chain");
            return Ok(None);
        };

        let retry = self.retry_config();
        let timeout = Duration::from_secs(self.timeout_secs);
        let connect = (|| RpcChainSource::connect(url.clone(), timeout))
            .retry(retry.backoff())
            .sleep(tokio::time::sleep)
            .when(SourceError::is_transient)
            .notify(|err: &SourceError, delay: Duration| {
                warn!(target: "ingest", %chain, %err, ?delay, "Failed to connect, retrying");
            });

        let source = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            source = connect => source.map_err(|err| {
                anyhow::anyhow!("failed to connect to the {chain} RPC at {url}: {err}")
            })?,
        };
        Ok(Some(Arc::new(RetryingSource::new(source, retry))))
    }
}
