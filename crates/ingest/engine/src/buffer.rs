//! Row batching under a size or age flush policy.

use std::time::Duration;
use tokio::time::Instant;

/// Default row count that triggers a flush.
pub const DEFAULT_FLUSH_ROWS: usize = 5_000;

/// Default age of the oldest unflushed batch that triggers a flush.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(60_000);

/// When a [`BatchBuffer`] is due for a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Flush once this many rows are buffered.
    pub max_rows: usize,
    /// Flush once this much time has passed since the last flush.
    pub max_age: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self { max_rows: DEFAULT_FLUSH_ROWS, max_age: DEFAULT_FLUSH_INTERVAL }
    }
}

/// Ordered rows awaiting persistence.
///
/// Taking a batch detaches the buffered rows, so rows pushed while the batch is being written
/// land in the next batch.
#[derive(Debug)]
pub struct BatchBuffer<R> {
    rows: Vec<R>,
    policy: FlushPolicy,
    last_flush: Instant,
}

impl<R> BatchBuffer<R> {
    /// Creates an empty buffer. The flush clock starts now.
    pub fn new(policy: FlushPolicy) -> Self {
        Self { rows: Vec::new(), policy, last_flush: Instant::now() }
    }

    /// Appends a row.
    pub fn push(&mut self, row: R) {
        self.rows.push(row);
    }

    /// Number of buffered rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are buffered.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// When rows were last taken from the buffer.
    pub const fn last_flush(&self) -> Instant {
        self.last_flush
    }

    /// The flush policy.
    pub const fn policy(&self) -> &FlushPolicy {
        &self.policy
    }

    /// Whether the row or age threshold has been reached.
    pub fn is_due(&self) -> bool {
        self.rows.len() >= self.policy.max_rows || self.last_flush.elapsed() >= self.policy.max_age
    }

    /// Takes the buffered rows if the policy says a flush is due.
    pub fn take_due(&mut self) -> Option<Vec<R>> {
        if self.is_due() { self.take() } else { None }
    }

    /// Takes the buffered rows regardless of the policy.
    ///
    /// Returns `None`, and leaves the flush clock untouched, when the buffer is empty.
    pub fn take(&mut self) -> Option<Vec<R>> {
        if self.rows.is_empty() {
            return None;
        }
        self.last_flush = Instant::now();
        Some(std::mem::take(&mut self.rows))
    }
}
