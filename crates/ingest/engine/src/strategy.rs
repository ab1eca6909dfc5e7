//! Per-chain ingestion strategy.

use crate::Enricher;
use cadence_chain::ChainKind;

/// Default confirmation depth, in blocks, of every chain.
pub const DEFAULT_CONFIRMATION_DEPTH: u64 = 64;

/// Everything that differs between chains during a block time run, selected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStrategy {
    /// The chain being ingested.
    pub chain: ChainKind,
    /// Blocks behind the tip considered safe from reversal.
    pub confirmation_depth: u64,
    /// Derives the chain's extension columns.
    pub enricher: Enricher,
}

impl ChainStrategy {
    /// The strategy of `chain` with the default confirmation depth.
    pub const fn for_chain(chain: ChainKind) -> Self {
        Self {
            chain,
            confirmation_depth: DEFAULT_CONFIRMATION_DEPTH,
            enricher: Enricher::for_chain(chain),
        }
    }

    /// Overrides the confirmation depth.
    pub const fn with_confirmation_depth(mut self, confirmation_depth: u64) -> Self {
        self.confirmation_depth = confirmation_depth;
        self
    }
}
