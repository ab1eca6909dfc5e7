//! Offline operator rows.

use super::iso8601_utc;
use alloy_primitives::B256;

/// Bundle participation of one operator in one epoch, as reported by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorBundles {
    /// The operator.
    pub operator_id: u64,
    /// The domain the operator serves.
    pub domain_id: u32,
    /// Bundles submitted in the epoch.
    pub submitted_bundles: u32,
    /// Bundles the operator was expected to submit.
    pub expected_bundles: u32,
    /// Minimum bundles required to be considered online.
    pub min_required_bundles: u32,
}

impl OperatorBundles {
    /// Bundles missing to reach the minimum. Negative if the operator exceeded it.
    pub fn shortfall(&self) -> i64 {
        i64::from(self.min_required_bundles) - i64::from(self.submitted_bundles)
    }
}

/// Shortfall as a percentage of the expected bundles. Zero when nothing was expected.
pub fn shortfall_pct(shortfall: i64, expected_bundles: u32) -> f64 {
    if expected_bundles == 0 {
        return 0.0;
    }
    shortfall as f64 / f64::from(expected_bundles) * 100.0
}

/// One row per operator found insufficiently participating in an epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineOperatorEvent {
    /// The block that closed the epoch.
    pub block_number: u64,
    /// The hash of that block.
    pub block_hash: B256,
    /// Block timestamp, milliseconds since the unix epoch.
    pub timestamp_ms: u64,
    /// The block timestamp as an RFC 3339 string.
    pub timestamp_utc: String,
    /// The domain.
    pub domain_id: u32,
    /// The completed epoch, or 0 when the block carried no completion for this domain.
    pub epoch_index: u32,
    /// The operator.
    pub operator_id: u64,
    /// Bundles submitted.
    pub submitted_bundles: u32,
    /// Bundles expected.
    pub expected_bundles: u32,
    /// Minimum bundles required.
    pub min_required_bundles: u32,
    /// `min_required_bundles - submitted_bundles`.
    pub shortfall: i64,
    /// `shortfall / expected_bundles * 100`, or 0 when `expected_bundles` is 0.
    pub shortfall_pct: f64,
    /// Wall clock time the row was built, milliseconds since the unix epoch.
    pub ingestion_ts_ms: u64,
}

impl OfflineOperatorEvent {
    /// Builds a row, deriving the shortfall columns and the timestamp string.
    pub fn new(
        block_number: u64,
        block_hash: B256,
        timestamp_ms: u64,
        epoch_index: u32,
        bundles: OperatorBundles,
        ingestion_ts_ms: u64,
    ) -> Self {
        let shortfall = bundles.shortfall();
        Self {
            block_number,
            block_hash,
            timestamp_ms,
            timestamp_utc: iso8601_utc(timestamp_ms),
            domain_id: bundles.domain_id,
            epoch_index,
            operator_id: bundles.operator_id,
            submitted_bundles: bundles.submitted_bundles,
            expected_bundles: bundles.expected_bundles,
            min_required_bundles: bundles.min_required_bundles,
            shortfall,
            shortfall_pct: shortfall_pct(shortfall, bundles.expected_bundles),
            ingestion_ts_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::none_submitted(0, 0)]
    #[case::some_submitted(3, 5)]
    #[case::over_submitted(9, 2)]
    fn test_zero_expected_has_zero_pct(#[case] submitted: u32, #[case] min_required: u32) {
        let bundles = OperatorBundles {
            operator_id: 1,
            domain_id: 0,
            submitted_bundles: submitted,
            expected_bundles: 0,
            min_required_bundles: min_required,
        };
        let row = OfflineOperatorEvent::new(10, B256::ZERO, 0, 3, bundles, 0);
        assert_eq!(row.shortfall_pct, 0.0);
        assert_eq!(row.shortfall, i64::from(min_required) - i64::from(submitted));
    }

    #[test]
    fn test_shortfall_columns() {
        let bundles = OperatorBundles {
            operator_id: 7,
            domain_id: 2,
            submitted_bundles: 4,
            expected_bundles: 20,
            min_required_bundles: 10,
        };
        let row = OfflineOperatorEvent::new(500, B256::repeat_byte(5), 1_000, 12, bundles, 99);

        assert_eq!(row.shortfall, 6);
        assert!((row.shortfall_pct - 30.0).abs() < f64::EPSILON);
        assert_eq!(row.epoch_index, 12);
        assert_eq!(row.operator_id, 7);
        assert_eq!(row.timestamp_utc, "1970-01-01T00:00:01.000Z");
    }

    #[test]
    fn test_negative_shortfall() {
        assert_eq!(shortfall_pct(-5, 10), -50.0);
    }
}
