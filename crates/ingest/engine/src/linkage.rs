//! Parent linkage tracking.

use alloy_primitives::B256;

/// The outcome of feeding one block to a [`LinkageTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// First block seen; there is no parent to measure against.
    Seeded,
    /// The block extends the previous block.
    Linked {
        /// Milliseconds between the previous block and this one.
        delta_ms: i64,
    },
    /// The block does not extend the previous block.
    Anomaly {
        /// The hash the block's parent hash was expected to match.
        expected_parent: B256,
    },
}

impl Linkage {
    /// Whether a row may be emitted for this transition.
    pub const fn is_linked(&self) -> bool {
        matches!(self, Self::Linked { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LinkPoint {
    hash: B256,
    timestamp_ms: u64,
}

/// Tracks the last processed block of one ingestion run.
///
/// Every call to [`LinkageTracker::step`] advances the tracker to the given block, whether or
/// not it linked. After an anomaly, deltas restart from the anomalous block.
#[derive(Debug, Clone, Default)]
pub struct LinkageTracker {
    previous: Option<LinkPoint>,
}

impl LinkageTracker {
    /// Creates a tracker that has not seen any block.
    pub const fn new() -> Self {
        Self { previous: None }
    }

    /// The hash and timestamp of the last block seen.
    pub fn previous(&self) -> Option<(B256, u64)> {
        self.previous.map(|p| (p.hash, p.timestamp_ms))
    }

    /// Feeds the next block.
    pub fn step(&mut self, parent_hash: B256, hash: B256, timestamp_ms: u64) -> Linkage {
        let outcome = match self.previous {
            None => Linkage::Seeded,
            Some(previous) if previous.hash == parent_hash => {
                Linkage::Linked { delta_ms: timestamp_ms.wrapping_sub(previous.timestamp_ms) as i64 }
            }
            Some(previous) => Linkage::Anomaly { expected_parent: previous.hash },
        };
        self.previous = Some(LinkPoint { hash, timestamp_ms });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u8) -> B256 {
        B256::repeat_byte(n)
    }

    #[test]
    fn test_first_block_seeds() {
        let mut tracker = LinkageTracker::new();
        assert_eq!(tracker.step(h(0), h(1), 1_000), Linkage::Seeded);
        assert_eq!(tracker.previous(), Some((h(1), 1_000)));
    }

    #[test]
    fn test_contiguous_run_emits_n_deltas() {
        let timestamps = [1_000, 2_500, 2_600, 9_000];
        let mut tracker = LinkageTracker::new();
        let outcomes: Vec<_> = timestamps
            .iter()
            .enumerate()
            .map(|(i, ts)| tracker.step(h(i as u8), h(i as u8 + 1), *ts))
            .collect();

        assert_eq!(
            outcomes,
            [
                Linkage::Seeded,
                Linkage::Linked { delta_ms: 1_500 },
                Linkage::Linked { delta_ms: 100 },
                Linkage::Linked { delta_ms: 6_400 },
            ]
        );
    }

    #[test]
    fn test_anomaly_restarts_from_anomalous_block() {
        let mut tracker = LinkageTracker::new();
        tracker.step(h(0), h(1), 1_000);
        tracker.step(h(1), h(2), 2_000);

        // Block 3 does not extend block 2.
        assert_eq!(tracker.step(h(9), h(3), 3_000), Linkage::Anomaly { expected_parent: h(2) });

        // Block 4 is measured against block 3, not block 2.
        assert_eq!(tracker.step(h(3), h(4), 3_250), Linkage::Linked { delta_ms: 250 });
    }

    #[test]
    fn test_negative_delta_is_kept() {
        let mut tracker = LinkageTracker::new();
        tracker.step(h(0), h(1), 5_000);
        assert_eq!(tracker.step(h(1), h(2), 4_000), Linkage::Linked { delta_ms: -1_000 });
    }
}
