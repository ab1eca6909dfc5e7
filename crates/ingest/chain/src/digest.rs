//! SCALE-encoded header digest items.

use parity_scale_codec::{Decode, DecodeAll, Encode};

/// A four byte consensus engine identifier, as carried by digest items.
pub type ConsensusEngineId = [u8; 4];

/// A single entry of a block header's digest log.
///
/// Only the variants a substrate node can emit are modelled. The codec indices match the
/// on-chain encoding, so raw digest logs returned over RPC decode directly into this type.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum DigestItem {
    /// Chain-specific data not tied to any consensus engine.
    #[codec(index = 0)]
    Other(Vec<u8>),
    /// A message from the runtime to a consensus engine.
    #[codec(index = 4)]
    Consensus(ConsensusEngineId, Vec<u8>),
    /// A seal produced by the block author.
    #[codec(index = 5)]
    Seal(ConsensusEngineId, Vec<u8>),
    /// A pre-runtime digest, inserted by the block author before execution.
    #[codec(index = 6)]
    PreRuntime(ConsensusEngineId, Vec<u8>),
    /// Signals that the runtime code or heap pages changed in this block.
    #[codec(index = 8)]
    RuntimeEnvironmentUpdated,
}

impl DigestItem {
    /// Decodes a digest item from its SCALE encoding. Trailing bytes are rejected.
    pub fn from_scale(mut bytes: &[u8]) -> Result<Self, parity_scale_codec::Error> {
        Self::decode_all(&mut bytes)
    }

    /// Returns the payload of a pre-runtime digest tagged with `engine`, if this is one.
    pub fn pre_runtime(&self, engine: ConsensusEngineId) -> Option<&[u8]> {
        match self {
            Self::PreRuntime(id, data) if *id == engine => Some(data),
            _ => None,
        }
    }
}
