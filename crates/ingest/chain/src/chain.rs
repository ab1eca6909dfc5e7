//! Identifiers for the chains cadence ingests.

use strum::{AsRefStr, Display, EnumString};

/// The chains an ingestion run can target.
///
/// The string form (`consensus`, `auto-evm`) is used on the command line, in log fields, and
/// in the `chain=` partition directory of persisted batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ChainKind {
    /// The primary (consensus) chain.
    Consensus,
    /// The secondary (auto-evm domain) chain.
    AutoEvm,
}

impl ChainKind {
    /// Every known chain, primary first.
    pub const ALL: [Self; 2] = [Self::Consensus, Self::AutoEvm];

    /// Returns true for the primary chain.
    pub const fn is_primary(&self) -> bool {
        matches!(self, Self::Consensus)
    }
}
