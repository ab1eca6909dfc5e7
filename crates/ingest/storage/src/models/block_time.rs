//! Block time rows.

use super::iso8601_utc;
use alloy_primitives::B256;
use cadence_chain::ChainKind;

/// Chain-specific columns of a [`BlockRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockExtension {
    /// Columns derived from consensus chain events.
    Consensus {
        /// Whether the block stored a segment header.
        contains_segment_header: bool,
        /// Number of bundles stored in the block.
        bundle_count: u32,
    },
    /// Columns derived from the auto-evm header digest.
    AutoEvm {
        /// The consensus block this domain block references, when the digest carries one.
        consensus_block_hash: Option<B256>,
    },
}

impl BlockExtension {
    /// The chain these columns belong to.
    pub const fn chain(&self) -> ChainKind {
        match self {
            Self::Consensus { .. } => ChainKind::Consensus,
            Self::AutoEvm { .. } => ChainKind::AutoEvm,
        }
    }
}

/// One row per linked block transition.
///
/// The chain of a record is implied by its [`BlockExtension`], so a record cannot claim one
/// chain and carry another chain's columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    /// The block number.
    pub block_number: u64,
    /// The block hash.
    pub hash: B256,
    /// The parent block hash.
    pub parent_hash: B256,
    /// Block timestamp, milliseconds since the unix epoch.
    pub timestamp_ms: u64,
    /// The block timestamp as an RFC 3339 string.
    pub timestamp_utc: String,
    /// Milliseconds elapsed since the parent block.
    pub delta_since_parent_ms: i64,
    /// Wall clock time the row was built, milliseconds since the unix epoch.
    pub ingestion_ts_ms: u64,
    /// Chain-specific columns.
    pub extension: BlockExtension,
}

impl BlockRecord {
    /// Builds a record, deriving the timestamp string.
    pub fn new(
        block_number: u64,
        hash: B256,
        parent_hash: B256,
        timestamp_ms: u64,
        delta_since_parent_ms: i64,
        ingestion_ts_ms: u64,
        extension: BlockExtension,
    ) -> Self {
        Self {
            block_number,
            hash,
            parent_hash,
            timestamp_ms,
            timestamp_utc: iso8601_utc(timestamp_ms),
            delta_since_parent_ms,
            ingestion_ts_ms,
            extension,
        }
    }

    /// The chain this record belongs to.
    pub const fn chain(&self) -> ChainKind {
        self.extension.chain()
    }
}
