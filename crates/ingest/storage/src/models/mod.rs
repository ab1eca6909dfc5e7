//! Row models persisted by the storage layer.
//!
//! Rows are built once inside the ingestion loop, held by a batch buffer, and dropped after
//! they are handed to a [`StorageSink`](crate::StorageSink). They are never mutated after
//! construction.

mod block_time;
pub use block_time::{BlockExtension, BlockRecord};

mod offline;
pub use offline::{OfflineOperatorEvent, OperatorBundles, shortfall_pct};

use chrono::{DateTime, SecondsFormat, Utc};

/// The current wall clock time in milliseconds since the unix epoch.
pub fn unix_time_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Formats a millisecond unix timestamp as an RFC 3339 UTC string with millisecond precision,
/// e.g. `2024-01-01T00:00:00.000Z`.
///
/// Timestamps beyond chrono's representable range format as an empty string.
pub fn iso8601_utc(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}
