//! Range planning for bounded scans.

use std::ops::RangeInclusive;

/// The inputs that decide which blocks a bounded scan covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeRequest {
    /// The current tip block number.
    pub tip: u64,
    /// Explicit first block.
    pub start: Option<u64>,
    /// Explicit last block.
    pub end: Option<u64>,
    /// Blocks behind the tip considered safe from reversal.
    pub confirmation_depth: u64,
    /// Blocks below the confirmed tip covered by default. `None` starts at block 1.
    pub window: Option<u64>,
    /// The block after the last persisted one, consulted only without an explicit start.
    pub resume_cursor: Option<u64>,
}

impl RangeRequest {
    /// `tip - confirmation_depth`, saturating at 0.
    pub const fn confirmed_tip(&self) -> u64 {
        self.tip.saturating_sub(self.confirmation_depth)
    }
}

/// Plans the inclusive block range of a scan, or `None` when the start lies past the end.
///
/// The start is the explicit start, else the resume cursor, else `confirmed_tip - window`
/// clamped to 1. The end is the explicit end, else the confirmed tip.
pub fn plan_range(request: &RangeRequest) -> Option<RangeInclusive<u64>> {
    let confirmed_tip = request.confirmed_tip();
    let end = request.end.unwrap_or(confirmed_tip);
    let default_start = request.window.map_or(1, |window| confirmed_tip.saturating_sub(window).max(1));
    let start = request.start.or(request.resume_cursor).unwrap_or(default_start);

    (start <= end).then_some(start..=end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn request(tip: u64, depth: u64) -> RangeRequest {
        RangeRequest { tip, confirmation_depth: depth, window: Some(5_000), ..Default::default() }
    }

    #[rstest]
    #[case::window_below_confirmed_tip(request(10_064, 64), Some(5_000..=10_000))]
    #[case::window_clamped_to_one(request(1_000, 64), Some(1..=936))]
    #[case::tip_below_depth(request(10, 64), None)]
    #[case::explicit_range(
        RangeRequest { start: Some(100), end: Some(103), ..request(10_064, 64) },
        Some(100..=103)
    )]
    #[case::resume_cursor_overrides_window(
        RangeRequest { resume_cursor: Some(9_001), ..request(10_064, 64) },
        Some(9_001..=10_000)
    )]
    #[case::explicit_start_beats_cursor(
        RangeRequest { start: Some(7), resume_cursor: Some(9_001), ..request(10_064, 64) },
        Some(7..=10_000)
    )]
    #[case::cursor_past_end(
        RangeRequest { resume_cursor: Some(10_001), ..request(10_064, 64) },
        None
    )]
    #[case::start_after_end(
        RangeRequest { start: Some(50), end: Some(49), ..request(10_064, 64) },
        None
    )]
    #[case::no_window_starts_at_one(
        RangeRequest { window: None, ..request(10_064, 64) },
        Some(1..=10_000)
    )]
    fn test_plan_range(#[case] request: RangeRequest, #[case] expected: Option<RangeInclusive<u64>>) {
        assert_eq!(plan_range(&request), expected);
    }
}
