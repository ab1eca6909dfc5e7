//! Bounded block time backfill.

use crate::{
    BackfillConfig, BatchBuffer, ChainStrategy, EnrichmentMode, IngestResult, Linkage,
    LinkageTracker, RangeRequest, ResumeResolver, cancel::until_cancelled, metrics::Metrics,
    plan_range,
};
use cadence_chain::{BlockHeader, ChainSource};
use cadence_storage::{BlockRecord, Dataset, StorageSink, iso8601_utc, unix_time_ms};
use std::{ops::RangeInclusive, sync::Arc};
use tokio_util::sync::CancellationToken;

/// The outcome of a [`BackfillWalker`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    /// The planned range, or `None` if there was nothing to do.
    pub range: Option<RangeInclusive<u64>>,
    /// Blocks fetched.
    pub blocks: u64,
    /// Rows built.
    pub rows: u64,
    /// Transitions skipped for a parent hash mismatch.
    pub anomalies: u64,
    /// Batches persisted.
    pub batches: u64,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
}

/// Walks a block range of one chain in order and persists a row per linked transition.
///
/// The range is planned from the tip, the strategy's confirmation depth, the configured
/// overrides and, without an explicit start, the sink's resume cursor. Residual rows are
/// flushed when the walk ends, including when it ends early. Cancellation interrupts any
/// pending chain read, including its retries.
#[derive(Debug)]
pub struct BackfillWalker<C: ?Sized, S: ?Sized> {
    source: Arc<C>,
    sink: Arc<S>,
    strategy: ChainStrategy,
    config: BackfillConfig,
}

impl<C, S> BackfillWalker<C, S>
where
    C: ChainSource + ?Sized,
    S: StorageSink + ?Sized,
{
    /// Creates a walker.
    pub const fn new(
        source: Arc<C>,
        sink: Arc<S>,
        strategy: ChainStrategy,
        config: BackfillConfig,
    ) -> Self {
        Self { source, sink, strategy, config }
    }

    /// Runs the backfill to completion or cancellation.
    pub async fn run(&self, cancel: CancellationToken) -> IngestResult<BackfillSummary> {
        let chain = self.strategy.chain;
        let mut summary = BackfillSummary::default();
        let Some(tip) = until_cancelled(&cancel, self.source.tip_header()).await else {
            info!(target: "backfill", %chain, "Backfill cancelled before planning");
            summary.cancelled = true;
            return Ok(summary);
        };
        let tip = tip?.number;
        let resume_cursor = match self.config.start {
            Some(_) => None,
            None => {
                ResumeResolver::new(&*self.sink).resume_cursor(Dataset::BlockTimes(chain)).await
            }
        };

        let request = RangeRequest {
            tip,
            start: self.config.start,
            end: self.config.end,
            confirmation_depth: self.strategy.confirmation_depth,
            window: Some(self.config.window),
            resume_cursor,
        };
        let Some(range) = plan_range(&request) else {
            info!(
                target: "backfill",
                %chain,
                tip,
                start = ?request.start.or(resume_cursor),
                end = request.end.unwrap_or(request.confirmed_tip()),
                "Nothing to backfill"
            );
            return Ok(summary);
        };

        info!(
            target: "backfill",
            %chain,
            start = range.start(),
            end = range.end(),
            confirmation_depth = self.strategy.confirmation_depth,
            "Starting backfill"
        );
        summary.range = Some(range.clone());

        let mut tracker = LinkageTracker::new();
        let mut buffer = BatchBuffer::new(self.config.flush);
        let walked = self.walk(range, &mut tracker, &mut buffer, &mut summary, &cancel).await;
        let flushed = self.flush(buffer.take(), &mut summary).await;
        walked.and(flushed)?;

        info!(
            target: "backfill",
            %chain,
            blocks = summary.blocks,
            rows = summary.rows,
            anomalies = summary.anomalies,
            batches = summary.batches,
            cancelled = summary.cancelled,
            "Backfill finished"
        );
        Ok(summary)
    }

    async fn walk(
        &self,
        range: RangeInclusive<u64>,
        tracker: &mut LinkageTracker,
        buffer: &mut BatchBuffer<BlockRecord>,
        summary: &mut BackfillSummary,
        cancel: &CancellationToken,
    ) -> IngestResult<()> {
        let chain = self.strategy.chain;
        for number in range {
            let Some(fetched) = until_cancelled(cancel, self.fetch(number)).await else {
                info!(target: "backfill", %chain, number, "Backfill cancelled");
                summary.cancelled = true;
                return Ok(());
            };
            let (header, timestamp_ms) = fetched?;
            summary.blocks += 1;

            match tracker.step(header.parent_hash, header.hash, timestamp_ms) {
                Linkage::Seeded => {}
                Linkage::Linked { delta_ms } => {
                    let enrich =
                        self.strategy.enricher.enrich(&*self.source, &header, EnrichmentMode::Full);
                    let Some(extension) = until_cancelled(cancel, enrich).await else {
                        info!(target: "backfill", %chain, number, "Backfill cancelled while enriching");
                        summary.cancelled = true;
                        return Ok(());
                    };
                    let extension = extension?;
                    buffer.push(BlockRecord::new(
                        header.number,
                        header.hash,
                        header.parent_hash,
                        timestamp_ms,
                        delta_ms,
                        unix_time_ms(),
                        extension,
                    ));
                    summary.rows += 1;
                    Metrics::row_emitted(chain);
                }
                Linkage::Anomaly { expected_parent } => {
                    warn!(
                        target: "backfill",
                        %chain,
                        number,
                        hash = %header.hash,
                        parent_hash = %header.parent_hash,
                        %expected_parent,
                        "Non-linear backfill step, skipping delta"
                    );
                    summary.anomalies += 1;
                    Metrics::linkage_anomaly(chain);
                }
            }

            if number.is_multiple_of(self.config.progress_interval) {
                info!(
                    target: "backfill",
                    %chain,
                    number,
                    hash = %header.hash,
                    timestamp = %iso8601_utc(timestamp_ms),
                    "Processed block"
                );
            }

            self.flush(buffer.take_due(), summary).await?;
        }
        Ok(())
    }

    async fn fetch(&self, number: u64) -> IngestResult<(BlockHeader, u64)> {
        let hash = self.source.block_hash(number).await?;
        let header = self.source.header(hash).await?;
        let timestamp_ms = self.source.timestamp_ms(hash).await?;
        Ok((header, timestamp_ms))
    }

    async fn flush(
        &self,
        rows: Option<Vec<BlockRecord>>,
        summary: &mut BackfillSummary,
    ) -> IngestResult<()> {
        let Some(rows) = rows else {
            return Ok(());
        };
        let chain = self.strategy.chain;
        let count = rows.len();
        let path = self.sink.write_block_times(chain, rows).await?;

        summary.batches += 1;
        Metrics::batch_flushed(Dataset::BlockTimes(chain), count);
        info!(target: "backfill", %chain, rows = count, path = %path.display(), "Flushed backfill batch");
        Ok(())
    }
}
