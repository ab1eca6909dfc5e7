//! Live block time ingestion from new head notifications.

use crate::{
    BatchBuffer, Enricher, IngestError, IngestResult, Linkage, LinkageTracker, StreamConfig,
    cancel::until_cancelled, metrics::Metrics,
};
use backon::Retryable;
use cadence_chain::{BlockHeader, ChainKind, ChainSource, HeadStream, SourceError};
use cadence_storage::{BlockRecord, Dataset, StorageSink, unix_time_ms};
use futures::StreamExt;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinSet, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// The outcome of a [`StreamSubscriber`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Heads received.
    pub heads: u64,
    /// Rows built.
    pub rows: u64,
    /// Heads skipped for a parent hash mismatch.
    pub anomalies: u64,
    /// Batches persisted.
    pub batches: u64,
    /// Head subscriptions opened, including the first.
    pub subscriptions: u64,
}

/// Follows the new heads of one chain until cancelled.
///
/// Heads and the flush timer are handled on one task, so appends and flushes never interleave.
/// When the subscription errors or ends it is re-opened with backoff; linkage state carries
/// over, so the first head after a gap is checked against the last head before it.
///
/// Cancellation interrupts the reads a head needs (timestamp, enrichment), including their
/// retries, but never a batch write already in progress.
#[derive(Debug)]
pub struct StreamSubscriber<C: ?Sized, S: ?Sized> {
    source: Arc<C>,
    sink: Arc<S>,
    chain: ChainKind,
    enricher: Enricher,
    config: StreamConfig,
    tracker: LinkageTracker,
    buffer: BatchBuffer<BlockRecord>,
    summary: StreamSummary,
}

impl<C, S> StreamSubscriber<C, S>
where
    C: ChainSource + ?Sized,
    S: StorageSink + ?Sized,
{
    /// Creates a subscriber for `chain`.
    pub fn new(source: Arc<C>, sink: Arc<S>, chain: ChainKind, config: StreamConfig) -> Self {
        Self {
            source,
            sink,
            chain,
            enricher: Enricher::for_chain(chain),
            config,
            tracker: LinkageTracker::new(),
            buffer: BatchBuffer::new(config.flush),
            summary: StreamSummary::default(),
        }
    }

    /// The chain this subscriber follows.
    pub const fn chain(&self) -> ChainKind {
        self.chain
    }

    /// Streams heads until `cancel` fires or an unrecoverable error occurs.
    ///
    /// Buffered rows are flushed before returning, on error as well as on cancellation.
    pub async fn run(mut self, cancel: CancellationToken) -> IngestResult<StreamSummary> {
        info!(target: "stream", chain = %self.chain, mode = ?self.config.mode, "Starting stream");

        let followed = self.follow(&cancel).await;
        let rows = self.buffer.take();
        let flushed = self.flush(rows).await;
        if let (Err(_), Err(err)) = (&followed, &flushed) {
            error!(target: "stream", chain = %self.chain, %err, "Final flush failed");
        }
        followed.and(flushed)?;

        info!(
            target: "stream",
            chain = %self.chain,
            heads = self.summary.heads,
            rows = self.summary.rows,
            anomalies = self.summary.anomalies,
            batches = self.summary.batches,
            "Stream stopped"
        );
        Ok(self.summary)
    }

    async fn follow(&mut self, cancel: &CancellationToken) -> IngestResult<()> {
        let Some(mut heads) = self.subscribe(cancel).await? else {
            return Ok(());
        };

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(target: "stream", chain = %self.chain, "Stream cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let rows = self.buffer.take_due();
                    self.flush(rows).await?;
                }
                head = heads.next() => {
                    let reason = match head {
                        Some(Ok(header)) => {
                            let Some(record) = until_cancelled(cancel, self.prepare(header)).await
                            else {
                                info!(target: "stream", chain = %self.chain, "Stream cancelled while reading head");
                                return Ok(());
                            };
                            if let Some(record) = record? {
                                self.append(record).await?;
                            }
                            continue;
                        }
                        Some(Err(err)) => err.to_string(),
                        None => "subscription ended".to_string(),
                    };
                    warn!(target: "stream", chain = %self.chain, %reason, "Head subscription interrupted, resubscribing");
                    match self.subscribe(cancel).await? {
                        Some(stream) => heads = stream,
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    /// Opens a head subscription with backoff. Returns `None` if cancelled first.
    async fn subscribe(&mut self, cancel: &CancellationToken) -> IngestResult<Option<HeadStream>> {
        let source = &self.source;
        let chain = self.chain;
        let subscribe = (|| source.subscribe_new_heads())
            .retry(self.config.resubscribe.backoff())
            .sleep(tokio::time::sleep)
            .when(SourceError::is_transient)
            .notify(|err: &SourceError, delay: Duration| {
                warn!(target: "stream", %chain, %err, ?delay, "Subscribing to new heads failed, retrying");
            });

        let heads = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            heads = subscribe => heads?,
        };
        self.summary.subscriptions += 1;
        debug!(target: "stream", %chain, subscriptions = self.summary.subscriptions, "Subscribed to new heads");
        Ok(Some(heads))
    }

    /// Reads what a head needs and steps the linkage tracker. Returns the row to append when the
    /// head links to the previous one.
    async fn prepare(&mut self, header: BlockHeader) -> IngestResult<Option<BlockRecord>> {
        self.summary.heads += 1;
        let timestamp_ms = self.source.timestamp_ms(header.hash).await?;

        match self.tracker.step(header.parent_hash, header.hash, timestamp_ms) {
            Linkage::Seeded => {
                debug!(target: "stream", chain = %self.chain, number = header.number, "First head seen");
                Ok(None)
            }
            Linkage::Linked { delta_ms } => {
                let extension =
                    self.enricher.enrich(&*self.source, &header, self.config.mode).await?;
                Ok(Some(BlockRecord::new(
                    header.number,
                    header.hash,
                    header.parent_hash,
                    timestamp_ms,
                    delta_ms,
                    unix_time_ms(),
                    extension,
                )))
            }
            Linkage::Anomaly { expected_parent } => {
                warn!(
                    target: "stream",
                    chain = %self.chain,
                    number = header.number,
                    hash = %header.hash,
                    parent_hash = %header.parent_hash,
                    %expected_parent,
                    "Reorg edge detected, skipping delta"
                );
                self.summary.anomalies += 1;
                Metrics::linkage_anomaly(self.chain);
                Ok(None)
            }
        }
    }

    async fn append(&mut self, record: BlockRecord) -> IngestResult<()> {
        self.buffer.push(record);
        self.summary.rows += 1;
        Metrics::row_emitted(self.chain);

        let rows = self.buffer.take_due();
        self.flush(rows).await
    }

    async fn flush(&mut self, rows: Option<Vec<BlockRecord>>) -> IngestResult<()> {
        let Some(rows) = rows else {
            return Ok(());
        };
        let count = rows.len();
        let path = self.sink.write_block_times(self.chain, rows).await?;

        self.summary.batches += 1;
        Metrics::batch_flushed(Dataset::BlockTimes(self.chain), count);
        info!(target: "stream", chain = %self.chain, rows = count, path = %path.display(), "Flushed batch");
        Ok(())
    }
}

/// Runs one subscriber per chain concurrently until `cancel` fires or one of them fails.
///
/// The first failure cancels the remaining subscribers, waits for them to flush, and is
/// returned. Otherwise the summaries of all subscribers are returned in completion order.
pub async fn stream_chains<C, S>(
    subscribers: Vec<StreamSubscriber<C, S>>,
    cancel: CancellationToken,
) -> IngestResult<Vec<(ChainKind, StreamSummary)>>
where
    C: ChainSource + ?Sized + 'static,
    S: StorageSink + ?Sized + 'static,
{
    let group = cancel.child_token();
    let mut tasks = JoinSet::new();
    for subscriber in subscribers {
        let chain = subscriber.chain();
        let token = group.clone();
        tasks.spawn(async move { (chain, subscriber.run(token).await) });
    }

    let mut summaries = Vec::new();
    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok((chain, Ok(summary))) => {
                summaries.push((chain, summary));
                continue;
            }
            Ok((chain, Err(err))) => {
                error!(target: "stream", %chain, %err, "Stream failed");
                err
            }
            Err(err) => {
                error!(target: "stream", %err, "Stream task failed");
                IngestError::Task(err.to_string())
            }
        };
        group.cancel();
        failure.get_or_insert(outcome);
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(summaries),
    }
}
