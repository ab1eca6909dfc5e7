//! Cancellation helpers shared by the drivers.

use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Drives `fut` until it completes or `cancel` fires, whichever is first.
///
/// Returns `None` when cancelled; the future is dropped at its current await point. A token
/// that is already cancelled wins over a future that is ready on its first poll.
pub(crate) async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_completes_before_cancel() {
        let cancel = CancellationToken::new();
        assert_eq!(until_cancelled(&cancel, async { 7 }).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pending_future() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let never = std::future::pending::<()>();
        assert_eq!(until_cancelled(&cancel, never).await, None);
    }

    #[tokio::test]
    async fn test_already_cancelled_wins() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(until_cancelled(&cancel, async { 7 }).await, None);
    }
}
