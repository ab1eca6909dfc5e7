//! Offline operator scan over epoch transition blocks.

use crate::{
    BatchBuffer, IngestError, IngestResult, OfflineConfig, RangeRequest, ResumeResolver,
    cancel::until_cancelled, epoch_completions, metrics::Metrics, offline_operators, plan_range,
};
use alloy_primitives::B256;
use cadence_chain::{BlockEvent, ChainKind, ChainSource};
use cadence_storage::{Dataset, OfflineOperatorEvent, StorageSink, unix_time_ms};
use std::{ops::RangeInclusive, sync::Arc};
use tokio_util::sync::CancellationToken;

/// The outcome of an [`OfflineBackfill`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfflineSummary {
    /// The planned range, or `None` if there was nothing to do.
    pub range: Option<RangeInclusive<u64>>,
    /// Blocks whose events were scanned.
    pub blocks: u64,
    /// Blocks that completed at least one domain epoch.
    pub epoch_blocks: u64,
    /// Rows built.
    pub rows: u64,
    /// Batches persisted.
    pub batches: u64,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
}

/// Scans consensus blocks for epoch transitions and records every operator reported offline.
///
/// Blocks without an epoch completion are skipped without resolving their timestamp. An epoch
/// block is timestamped from its `Timestamp::set` inherent, falling back to the
/// `Timestamp::Now` storage value when the source cannot decode the inherent.
#[derive(Debug)]
pub struct OfflineBackfill<C: ?Sized, S: ?Sized> {
    source: Arc<C>,
    sink: Arc<S>,
    config: OfflineConfig,
}

impl<C, S> OfflineBackfill<C, S>
where
    C: ChainSource + ?Sized,
    S: StorageSink + ?Sized,
{
    /// Creates a scan over the consensus chain served by `source`.
    pub const fn new(source: Arc<C>, sink: Arc<S>, config: OfflineConfig) -> Self {
        Self { source, sink, config }
    }

    /// Runs the scan to completion or cancellation.
    ///
    /// Fails with [`IngestError::EventsUnavailable`] if the source cannot decode events.
    pub async fn run(&self, cancel: CancellationToken) -> IngestResult<OfflineSummary> {
        let mut summary = OfflineSummary::default();
        let Some(tip) = until_cancelled(&cancel, self.source.tip_header()).await else {
            info!(target: "offline_backfill", "Offline operator backfill cancelled before planning");
            summary.cancelled = true;
            return Ok(summary);
        };
        let tip = tip?.number;
        let resume_cursor = match self.config.start {
            Some(_) => None,
            None => ResumeResolver::new(&*self.sink).resume_cursor(Dataset::OfflineOperators).await,
        };

        let request = RangeRequest {
            tip,
            start: self.config.start,
            end: self.config.end,
            confirmation_depth: self.config.confirmation_depth,
            window: None,
            resume_cursor,
        };
        let Some(range) = plan_range(&request) else {
            info!(
                target: "offline_backfill",
                tip,
                start = ?request.start.or(resume_cursor),
                end = request.end.unwrap_or(request.confirmed_tip()),
                "Nothing to backfill"
            );
            return Ok(summary);
        };

        info!(
            target: "offline_backfill",
            start = range.start(),
            end = range.end(),
            "Starting offline operator backfill"
        );
        summary.range = Some(range.clone());

        let mut buffer = BatchBuffer::new(self.config.flush);
        let scanned = self.scan(range, &mut buffer, &mut summary, &cancel).await;
        let flushed = self.flush(buffer.take(), &mut summary).await;
        scanned.and(flushed)?;

        info!(
            target: "offline_backfill",
            blocks = summary.blocks,
            epoch_blocks = summary.epoch_blocks,
            rows = summary.rows,
            batches = summary.batches,
            cancelled = summary.cancelled,
            "Offline operator backfill finished"
        );
        Ok(summary)
    }

    async fn scan(
        &self,
        range: RangeInclusive<u64>,
        buffer: &mut BatchBuffer<OfflineOperatorEvent>,
        summary: &mut OfflineSummary,
        cancel: &CancellationToken,
    ) -> IngestResult<()> {
        for number in range {
            let Some(fetched) = until_cancelled(cancel, self.fetch(number)).await else {
                info!(target: "offline_backfill", number, "Offline operator backfill cancelled");
                summary.cancelled = true;
                return Ok(());
            };
            let (hash, events) = fetched?;
            summary.blocks += 1;

            let epochs = epoch_completions(&events);
            if epochs.is_empty() {
                if number.is_multiple_of(self.config.progress_interval) {
                    info!(
                        target: "offline_backfill",
                        number,
                        epoch_blocks = summary.epoch_blocks,
                        rows = summary.rows,
                        "Scanning"
                    );
                }
                continue;
            }
            summary.epoch_blocks += 1;

            let Some(timestamp_ms) = until_cancelled(cancel, self.epoch_timestamp(hash)).await
            else {
                info!(target: "offline_backfill", number, "Offline operator backfill cancelled");
                summary.cancelled = true;
                return Ok(());
            };
            let timestamp_ms = timestamp_ms?;
            let offline = offline_operators(&events);
            for operator in &offline {
                buffer.push(OfflineOperatorEvent::new(
                    number,
                    hash,
                    timestamp_ms,
                    operator.epoch_index,
                    operator.bundles,
                    unix_time_ms(),
                ));
            }
            summary.rows += offline.len() as u64;

            info!(
                target: "offline_backfill",
                number,
                epochs = epochs.len(),
                offline = offline.len(),
                total_rows = summary.rows,
                "Epoch transition block"
            );

            self.flush(buffer.take_due(), summary).await?;
        }
        Ok(())
    }

    async fn fetch(&self, number: u64) -> IngestResult<(B256, Vec<BlockEvent>)> {
        let hash = self.source.block_hash(number).await?;
        let events = self
            .source
            .events(hash)
            .await?
            .ok_or(IngestError::EventsUnavailable(ChainKind::Consensus))?;
        Ok((hash, events))
    }

    /// The timestamp of an epoch block: the `Timestamp::set` inherent when the source decodes
    /// it, otherwise the `Timestamp::Now` storage value.
    async fn epoch_timestamp(&self, hash: B256) -> IngestResult<u64> {
        if let Some(timestamp_ms) = self.source.block(hash).await?.inherent_timestamp_ms {
            return Ok(timestamp_ms);
        }
        debug!(target: "offline_backfill", %hash, "No timestamp inherent, reading storage");
        Ok(self.source.timestamp_ms(hash).await?)
    }

    async fn flush(
        &self,
        rows: Option<Vec<OfflineOperatorEvent>>,
        summary: &mut OfflineSummary,
    ) -> IngestResult<()> {
        let Some(rows) = rows else {
            return Ok(());
        };
        let count = rows.len();
        let path = self.sink.write_offline_operators(rows).await?;

        summary.batches += 1;
        Metrics::batch_flushed(Dataset::OfflineOperators, count);
        info!(target: "offline_backfill", rows = count, path = %path.display(), "Flushed offline operator batch");
        Ok(())
    }
}
