//! Contains the ingest CLI.

use crate::{
    commands::{BackfillCommand, OfflineCommand, StreamCommand},
    flags::GlobalArgs,
};
use anyhow::Result;
use cadence_cli::{cli_styles, init_tracing_subscriber};
use clap::{Parser, Subcommand};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Subcommands for the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Streams block times of new heads.
    Stream(StreamCommand),
    /// Backfills block times of a block range.
    Backfill(BackfillCommand),
    /// Backfills offline operators from epoch transitions.
    BackfillOffline(OfflineCommand),
}

/// Block time and offline operator ingestion for the consensus and auto-evm chains.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, styles = cli_styles(), long_about = None)]
pub struct Cli {
    /// Global arguments for the CLI.
    #[command(flatten)]
    pub global: GlobalArgs,
    /// The subcommand to run.
    #[command(subcommand)]
    pub subcommand: Commands,
}

impl Cli {
    /// Runs the CLI.
    pub fn run(self) -> Result<()> {
        // Initialize the telemetry stack.
        Self::init_stack(&self.global)?;

        let Self { global, subcommand } = self;
        Self::run_until_ctrl_c(|cancel| async move {
            match subcommand {
                Commands::Stream(cmd) => cmd.run(&global, cancel).await,
                Commands::Backfill(cmd) => cmd.run(&global, cancel).await,
                Commands::BackfillOffline(cmd) => cmd.run(&global, cancel).await,
            }
        })
    }

    /// Initialize the tracing stack and Prometheus metrics recorder.
    ///
    /// This function should be called at the beginning of the program.
    pub fn init_stack(global: &GlobalArgs) -> Result<()> {
        init_tracing_subscriber(&global.log_args)?;

        if let Some(addr) = global.metrics.init_metrics()? {
            cadence_engine::describe_ingest_metrics();
            debug!(target: "ingest", %addr, "Metrics exporter installed");
        }
        Ok(())
    }

    /// Runs the future built by `f` on a new runtime. Ctrl-C cancels the token handed to `f`.
    pub fn run_until_ctrl_c<F, Fut>(f: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let rt = Self::tokio_runtime()?;
        rt.block_on(async move {
            let cancel = CancellationToken::new();
            let signal = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!(target: "ingest", "Received Ctrl-C, flushing and shutting down");
                        signal.cancel();
                    }
                    Err(err) => warn!(target: "ingest", %err, "Failed to listen for Ctrl-C"),
                }
            });
            f(cancel).await
        })
    }

    /// Creates a new default tokio multi-thread [Runtime](tokio::runtime::Runtime) with all
    /// features enabled
    pub fn tokio_runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
        tokio::runtime::Builder::new_multi_thread().enable_all().build()
    }
}
