//! Bounded exponential backoff around any [`ChainSource`].

use crate::{Block, BlockEvent, BlockHeader, ChainSource, HeadStream, SourceError, SourceResult};
use alloy_primitives::B256;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::{future::Future, time::Duration};
use tracing::warn;

/// Default delay before the first retry.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(500);
/// Default cap on the delay between retries.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Backoff settings for transient chain source failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay before the first retry. Doubles on every attempt.
    pub min_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Maximum number of retries. `None` retries until the call succeeds.
    pub max_attempts: Option<usize>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { min_delay: DEFAULT_MIN_DELAY, max_delay: DEFAULT_MAX_DELAY, max_attempts: None }
    }
}

impl RetryConfig {
    /// Builds the backoff schedule described by this config.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_factor(2.0)
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts.unwrap_or(usize::MAX))
    }
}

/// A [`ChainSource`] that retries transient failures of the wrapped source.
///
/// Only errors for which [`SourceError::is_transient`] holds are retried; everything else is
/// returned on the first occurrence.
#[derive(Debug, Clone)]
pub struct RetryingSource<C> {
    inner: C,
    config: RetryConfig,
}

impl<C: ChainSource> RetryingSource<C> {
    /// Wraps `inner` with the given backoff settings.
    pub const fn new(inner: C, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Returns the wrapped source.
    pub const fn inner(&self) -> &C {
        &self.inner
    }

    async fn call<T, F, Fut>(&self, method: &'static str, operation: F) -> SourceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SourceResult<T>>,
    {
        operation
            .retry(self.config.backoff())
            .sleep(tokio::time::sleep)
            .when(SourceError::is_transient)
            .notify(|err: &SourceError, delay: Duration| {
                warn!(target: "rpc_source", method, %err, ?delay, "Transient chain source error, retrying");
            })
            .await
    }
}

#[async_trait]
impl<C: ChainSource> ChainSource for RetryingSource<C> {
    async fn tip_header(&self) -> SourceResult<BlockHeader> {
        self.call("tip_header", || self.inner.tip_header()).await
    }

    async fn block_hash(&self, number: u64) -> SourceResult<B256> {
        self.call("block_hash", || self.inner.block_hash(number)).await
    }

    async fn header(&self, hash: B256) -> SourceResult<BlockHeader> {
        self.call("header", || self.inner.header(hash)).await
    }

    async fn block(&self, hash: B256) -> SourceResult<Block> {
        self.call("block", || self.inner.block(hash)).await
    }

    async fn timestamp_ms(&self, hash: B256) -> SourceResult<u64> {
        self.call("timestamp_ms", || self.inner.timestamp_ms(hash)).await
    }

    async fn events(&self, hash: B256) -> SourceResult<Option<Vec<BlockEvent>>> {
        self.call("events", || self.inner.events(hash)).await
    }

    async fn subscribe_new_heads(&self) -> SourceResult<HeadStream> {
        self.call("subscribe_new_heads", || self.inner.subscribe_new_heads()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockChainSource;

    fn fast() -> RetryConfig {
        RetryConfig {
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            max_attempts: None,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures_until_success() {
        let mock = MockChainSource::linear(1, &[1_000, 2_000]);
        mock.fail_next(3, SourceError::Timeout);
        let source = RetryingSource::new(mock, fast());

        let hash = source.block_hash(2).await.unwrap();
        assert_eq!(hash, MockChainSource::hash_for(2));
        assert_eq!(source.inner().calls("block_hash"), 4);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_failures() {
        let mock = MockChainSource::linear(1, &[1_000]);
        let source = RetryingSource::new(mock, fast());

        let err = source.block_hash(99).await.unwrap_err();
        assert!(matches!(err, SourceError::BlockNumberNotFound(99)));
        assert_eq!(source.inner().calls("block_hash"), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let mock = MockChainSource::linear(1, &[1_000]);
        mock.fail_next(10, SourceError::Transport("connection reset".into()));
        let source = RetryingSource::new(mock, RetryConfig { max_attempts: Some(2), ..fast() });

        let err = source.timestamp_ms(MockChainSource::hash_for(1)).await.unwrap_err();
        assert!(matches!(err, SourceError::Transport(_)));
        assert_eq!(source.inner().calls("timestamp_ms"), 3);
    }
}
