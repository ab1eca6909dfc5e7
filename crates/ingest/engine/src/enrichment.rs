//! Chain-specific row enrichment.
//!
//! Each chain derives a fixed set of extension columns from data that was already fetched for
//! the block. The consensus chain counts events, the auto-evm chain reads its header digest,
//! and the offline operator scan pairs offline reports with the epoch they closed.

use alloy_primitives::B256;
use cadence_chain::{
    BlockEvent, BlockHeader, ChainKind, ChainSource, ConsensusEngineId, SourceResult,
};
use cadence_storage::{BlockExtension, OperatorBundles};

/// Engine id of the pre-runtime digest carrying the consensus block an auto-evm block builds on.
pub const CONSENSUS_BLOCK_ENGINE_ID: ConsensusEngineId = *b"RGTR";

/// How much data enrichment may fetch beyond the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentMode {
    /// Fetch the block's events where the chain derives columns from them.
    Full,
    /// Use only the header. Event derived columns take their defaults.
    HeadOnly,
}

/// Derives the extension columns of one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enricher {
    /// Segment header and bundle counts from block events.
    Consensus,
    /// Consensus block reference from the header digest.
    AutoEvm,
}

impl Enricher {
    /// The enricher of `chain`.
    pub const fn for_chain(chain: ChainKind) -> Self {
        match chain {
            ChainKind::Consensus => Self::Consensus,
            ChainKind::AutoEvm => Self::AutoEvm,
        }
    }

    /// The chain this enricher serves.
    pub const fn chain(&self) -> ChainKind {
        match self {
            Self::Consensus => ChainKind::Consensus,
            Self::AutoEvm => ChainKind::AutoEvm,
        }
    }

    /// Derives the extension columns for `header`.
    ///
    /// Only [`Enricher::Consensus`] in [`EnrichmentMode::Full`] calls the source.
    pub async fn enrich<C>(
        &self,
        source: &C,
        header: &BlockHeader,
        mode: EnrichmentMode,
    ) -> SourceResult<BlockExtension>
    where
        C: ChainSource + ?Sized,
    {
        match (self, mode) {
            (Self::Consensus, EnrichmentMode::Full) => {
                let events = source.events(header.hash).await?;
                Ok(consensus_extension(events.as_deref()))
            }
            (Self::Consensus, EnrichmentMode::HeadOnly) => Ok(consensus_extension(None)),
            (Self::AutoEvm, _) => Ok(auto_evm_extension(header)),
        }
    }
}

/// Consensus columns derived from a block's events, `(false, 0)` when no events are available.
pub fn consensus_extension(events: Option<&[BlockEvent]>) -> BlockExtension {
    let events = events.unwrap_or_default();
    let contains_segment_header =
        events.iter().any(|event| matches!(event, BlockEvent::SegmentHeaderStored { .. }));
    let bundle_count =
        events.iter().filter(|event| matches!(event, BlockEvent::BundleStored { .. })).count();

    BlockExtension::Consensus {
        contains_segment_header,
        bundle_count: u32::try_from(bundle_count).unwrap_or(u32::MAX),
    }
}

/// Auto-evm columns derived from the header digest.
pub fn auto_evm_extension(header: &BlockHeader) -> BlockExtension {
    BlockExtension::AutoEvm { consensus_block_hash: consensus_block_hash(header) }
}

/// The consensus block hash carried in the `RGTR` pre-runtime digest, if any.
pub fn consensus_block_hash(header: &BlockHeader) -> Option<B256> {
    let payload = header.pre_runtime(CONSENSUS_BLOCK_ENGINE_ID)?;
    match B256::try_from(payload) {
        Ok(hash) => Some(hash),
        Err(_) => {
            debug!(
                target: "enrichment",
                block = header.number,
                len = payload.len(),
                "Consensus digest payload is not a 32 byte hash"
            );
            None
        }
    }
}

/// The `(domain_id, epoch_index)` of every epoch completed in a block.
pub fn epoch_completions(events: &[BlockEvent]) -> Vec<(u32, u32)> {
    events
        .iter()
        .filter_map(|event| match event {
            BlockEvent::DomainEpochCompleted { domain_id, epoch_index } => {
                Some((*domain_id, *epoch_index))
            }
            _ => None,
        })
        .collect()
}

/// An operator found offline, with the epoch it was evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfflineOperator {
    /// The completed epoch of the operator's domain in the same block, 0 if there was none.
    pub epoch_index: u32,
    /// The reported bundle counts.
    pub bundles: OperatorBundles,
}

/// Pairs every offline report in a block with the epoch completion of the same domain.
///
/// When the block completed no epoch for the operator's domain, the epoch index is 0.
pub fn offline_operators(events: &[BlockEvent]) -> Vec<OfflineOperator> {
    let epochs = epoch_completions(events);
    events
        .iter()
        .filter_map(|event| match *event {
            BlockEvent::OperatorOffline {
                operator_id,
                domain_id,
                submitted_bundles,
                expected_bundles,
                min_required_bundles,
            } => Some(OperatorBundles {
                operator_id,
                domain_id,
                submitted_bundles,
                expected_bundles,
                min_required_bundles,
            }),
            _ => None,
        })
        .map(|bundles| OfflineOperator {
            epoch_index: epochs
                .iter()
                .find(|(domain_id, _)| *domain_id == bundles.domain_id)
                .map(|(_, epoch_index)| *epoch_index)
                .unwrap_or_default(),
            bundles,
        })
        .collect()
}
