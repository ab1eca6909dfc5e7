//! The [`ChainSource`] capability trait.

use crate::{Block, BlockEvent, BlockHeader, SourceResult};
use alloy_primitives::B256;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt::Debug;

/// A stream of new chain heads, in the order the node announced them.
pub type HeadStream = BoxStream<'static, SourceResult<BlockHeader>>;

/// Read access to a single chain.
///
/// Implementations expose only what the ingestion engine consumes. Every call may fail
/// transiently; callers decide whether to retry based on [`SourceError::is_transient`].
///
/// [`SourceError::is_transient`]: crate::SourceError::is_transient
#[async_trait]
pub trait ChainSource: Debug + Send + Sync {
    /// Returns the header of the current best block.
    async fn tip_header(&self) -> SourceResult<BlockHeader>;

    /// Returns the canonical block hash at `number`.
    async fn block_hash(&self, number: u64) -> SourceResult<B256>;

    /// Returns the header of the block with the given hash.
    async fn header(&self, hash: B256) -> SourceResult<BlockHeader>;

    /// Returns the header and extrinsics of the block with the given hash.
    async fn block(&self, hash: B256) -> SourceResult<Block>;

    /// Returns the block timestamp in milliseconds since the unix epoch.
    async fn timestamp_ms(&self, hash: B256) -> SourceResult<u64>;

    /// Returns the runtime events emitted by the block.
    ///
    /// `None` means this source cannot decode runtime events at all, as opposed to a block
    /// that emitted no events.
    async fn events(&self, hash: B256) -> SourceResult<Option<Vec<BlockEvent>>>;

    /// Subscribes to new best heads.
    async fn subscribe_new_heads(&self) -> SourceResult<HeadStream>;
}
