//! Block data consumed by the ingestion engine.

use crate::{ConsensusEngineId, DigestItem};
use alloy_primitives::{B256, Bytes};

/// The subset of a block header the ingestion engine consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// The block number.
    pub number: u64,
    /// The hash of this block.
    pub hash: B256,
    /// The hash of the parent block.
    pub parent_hash: B256,
    /// The decoded digest log.
    pub digest: Vec<DigestItem>,
}

impl BlockHeader {
    /// Creates a header with an empty digest.
    pub const fn new(number: u64, hash: B256, parent_hash: B256) -> Self {
        Self { number, hash, parent_hash, digest: Vec::new() }
    }

    /// Replaces the digest log.
    pub fn with_digest(mut self, digest: Vec<DigestItem>) -> Self {
        self.digest = digest;
        self
    }

    /// Returns the payload of the first pre-runtime digest tagged with `engine`.
    pub fn pre_runtime(&self, engine: ConsensusEngineId) -> Option<&[u8]> {
        self.digest.iter().find_map(|item| item.pre_runtime(engine))
    }
}

/// A block header together with its opaque extrinsics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// The SCALE-encoded extrinsics, in block order.
    pub extrinsics: Vec<Bytes>,
    /// The moment set by the block's `Timestamp::set` inherent, in milliseconds, when the
    /// source could decode it.
    pub inherent_timestamp_ms: Option<u64>,
}

/// A runtime event emitted while executing a block.
///
/// Only the events the ingestion engine derives facts from are modelled; everything else is
/// carried as [`BlockEvent::Other`] so callers can still count or log it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockEvent {
    /// A segment header was committed to the archive.
    SegmentHeaderStored {
        /// Index of the stored segment.
        segment_index: u64,
    },
    /// An operator bundle was stored on the consensus chain.
    BundleStored {
        /// The domain the bundle belongs to.
        domain_id: u32,
        /// The bundle hash.
        bundle_hash: B256,
    },
    /// A domain completed an epoch.
    DomainEpochCompleted {
        /// The domain whose epoch completed.
        domain_id: u32,
        /// The index of the completed epoch.
        epoch_index: u32,
    },
    /// An operator submitted fewer bundles than required in the epoch that just completed.
    OperatorOffline {
        /// The operator.
        operator_id: u64,
        /// The domain the operator serves.
        domain_id: u32,
        /// Bundles actually submitted.
        submitted_bundles: u32,
        /// Bundles the operator was expected to submit.
        expected_bundles: u32,
        /// Minimum bundles required to be considered online.
        min_required_bundles: u32,
    },
    /// Any other event.
    Other {
        /// The emitting pallet.
        pallet: String,
        /// The event name.
        name: String,
    },
}
