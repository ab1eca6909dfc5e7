//! Resume cursors for interrupted range scans.

use cadence_storage::{Dataset, StorageSink};

/// Looks up where a range scan left off.
#[derive(Debug)]
pub struct ResumeResolver<'a, S: ?Sized> {
    sink: &'a S,
}

impl<'a, S: StorageSink + ?Sized> ResumeResolver<'a, S> {
    /// Creates a resolver reading from `sink`.
    pub const fn new(sink: &'a S) -> Self {
        Self { sink }
    }

    /// The block after the highest persisted block of `dataset`.
    ///
    /// A dataset without rows and a failed lookup both yield `None`; the failure is logged.
    pub async fn resume_cursor(&self, dataset: Dataset) -> Option<u64> {
        match self.sink.max_persisted_block_number(dataset).await {
            Ok(Some(max)) => {
                let cursor = max.saturating_add(1);
                info!(target: "resume", %dataset, max, cursor, "Resuming after persisted block");
                Some(cursor)
            }
            Ok(None) => {
                debug!(target: "resume", %dataset, "No persisted rows, starting fresh");
                None
            }
            Err(err) => {
                warn!(target: "resume", %dataset, %err, "Resume lookup failed, starting fresh");
                None
            }
        }
    }
}
