//! Ingestion metrics.

use cadence_chain::ChainKind;
use cadence_storage::Dataset;

/// Container for the engine's metric names.
#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    #[cfg(feature = "metrics")]
    /// Block time rows built, by chain.
    pub(crate) const ROWS_EMITTED_TOTAL: &'static str = "cadence_ingest_rows_emitted_total";
    #[cfg(feature = "metrics")]
    /// Transitions skipped because the parent hash did not match, by chain.
    pub(crate) const LINKAGE_ANOMALIES_TOTAL: &'static str =
        "cadence_ingest_linkage_anomalies_total";
    #[cfg(feature = "metrics")]
    /// Batches persisted, by dataset.
    pub(crate) const BATCHES_FLUSHED_TOTAL: &'static str = "cadence_ingest_batches_flushed_total";
    #[cfg(feature = "metrics")]
    /// Rows persisted, by dataset.
    pub(crate) const ROWS_FLUSHED_TOTAL: &'static str = "cadence_ingest_rows_flushed_total";

    pub(crate) fn row_emitted(chain: ChainKind) {
        #[cfg(feature = "metrics")]
        metrics::counter!(Self::ROWS_EMITTED_TOTAL, "chain" => chain.to_string()).increment(1);
        #[cfg(not(feature = "metrics"))]
        let _ = chain;
    }

    pub(crate) fn linkage_anomaly(chain: ChainKind) {
        #[cfg(feature = "metrics")]
        metrics::counter!(Self::LINKAGE_ANOMALIES_TOTAL, "chain" => chain.to_string())
            .increment(1);
        #[cfg(not(feature = "metrics"))]
        let _ = chain;
    }

    pub(crate) fn batch_flushed(dataset: Dataset, rows: usize) {
        #[cfg(feature = "metrics")]
        {
            metrics::counter!(Self::BATCHES_FLUSHED_TOTAL, "dataset" => dataset.to_string())
                .increment(1);
            metrics::counter!(Self::ROWS_FLUSHED_TOTAL, "dataset" => dataset.to_string())
                .increment(rows as u64);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = (dataset, rows);
    }
}

/// Describes every metric the engine may record and zeroes the per-chain counters.
///
/// Call once at startup, after a recorder is installed. Does nothing without the `metrics`
/// feature.
pub fn describe_ingest_metrics() {
    #[cfg(feature = "metrics")]
    {
        metrics::describe_counter!(
            Metrics::ROWS_EMITTED_TOTAL,
            metrics::Unit::Count,
            "Block time rows built from linked block transitions"
        );
        metrics::describe_counter!(
            Metrics::LINKAGE_ANOMALIES_TOTAL,
            metrics::Unit::Count,
            "Block transitions skipped because the parent hash did not match"
        );
        metrics::describe_counter!(
            Metrics::BATCHES_FLUSHED_TOTAL,
            metrics::Unit::Count,
            "Batches handed to storage"
        );
        metrics::describe_counter!(
            Metrics::ROWS_FLUSHED_TOTAL,
            metrics::Unit::Count,
            "Rows handed to storage"
        );

        for chain in ChainKind::ALL {
            metrics::counter!(Metrics::ROWS_EMITTED_TOTAL, "chain" => chain.to_string())
                .increment(0);
            metrics::counter!(Metrics::LINKAGE_ANOMALIES_TOTAL, "chain" => chain.to_string())
                .increment(0);
        }
    }
}
