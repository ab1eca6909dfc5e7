//! Typed JSON-RPC bindings for the substrate `chain_*` and `state_*` namespaces.

use crate::{BlockHeader, DigestItem, SourceError, SourceResult};
use alloy_primitives::{B256, Bytes, U64};
use jsonrpsee::{
    core::{RpcResult, SubscriptionResult},
    proc_macros::rpc,
};
use serde::{Deserialize, Serialize};

/// A header as returned by `chain_getHeader` and `chain_subscribeNewHeads`.
///
/// Substrate nodes do not include the block hash in header responses, so converting into a
/// [`BlockHeader`] requires the hash the header was fetched at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcHeader {
    /// Parent block hash.
    pub parent_hash: B256,
    /// Block number, as a hex quantity.
    pub number: U64,
    /// State trie root.
    pub state_root: B256,
    /// Extrinsics trie root.
    pub extrinsics_root: B256,
    /// The header digest.
    pub digest: RpcDigest,
}

/// The digest of an [`RpcHeader`]: hex-encoded SCALE digest items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcDigest {
    /// The encoded digest items.
    pub logs: Vec<Bytes>,
}

/// A block body as returned by `chain_getBlock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcBlock {
    /// The block header.
    pub header: RpcHeader,
    /// Hex-encoded extrinsics.
    pub extrinsics: Vec<Bytes>,
}

/// The envelope `chain_getBlock` wraps blocks in. Justifications are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcSignedBlock {
    /// The block.
    pub block: RpcBlock,
}

impl RpcHeader {
    /// Converts into a [`BlockHeader`], decoding every digest log.
    pub fn into_header(self, hash: B256) -> SourceResult<BlockHeader> {
        let digest = self
            .digest
            .logs
            .iter()
            .map(|log| DigestItem::from_scale(log).map_err(|e| SourceError::decode("digest item", e)))
            .collect::<SourceResult<Vec<_>>>()?;
        Ok(BlockHeader { number: self.number.to(), hash, parent_hash: self.parent_hash, digest })
    }
}

/// The runtime version reported by `state_getRuntimeVersion`. Only the fields the decoder cache
/// keys on are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRuntimeVersion {
    /// The runtime spec version.
    pub spec_version: u32,
}

/// Block and header retrieval.
#[rpc(client, namespace = "chain")]
pub trait ChainApi {
    /// Returns the canonical hash at `number`, or the best hash when `number` is omitted.
    #[method(name = "getBlockHash")]
    async fn block_hash(&self, number: Option<u64>) -> RpcResult<Option<B256>>;

    /// Returns the header at `hash`, or the best header when `hash` is omitted.
    #[method(name = "getHeader")]
    async fn header(&self, hash: Option<B256>) -> RpcResult<Option<RpcHeader>>;

    /// Returns the block at `hash`, or the best block when `hash` is omitted.
    #[method(name = "getBlock")]
    async fn block(&self, hash: Option<B256>) -> RpcResult<Option<RpcSignedBlock>>;

    /// Subscribes to new best heads.
    #[subscription(
        name = "subscribeNewHeads" => "newHead",
        unsubscribe = "unsubscribeNewHeads",
        item = RpcHeader
    )]
    async fn subscribe_new_heads(&self) -> SubscriptionResult;
}

/// Raw storage access.
#[rpc(client, namespace = "state")]
pub trait StateApi {
    /// Returns the raw storage value at `key` as of block `at`.
    #[method(name = "getStorage")]
    async fn storage(&self, key: Bytes, at: Option<B256>) -> RpcResult<Option<Bytes>>;

    /// Returns the SCALE-encoded runtime metadata as of block `at`.
    #[method(name = "getMetadata")]
    async fn metadata(&self, at: Option<B256>) -> RpcResult<Bytes>;

    /// Returns the runtime version as of block `at`.
    #[method(name = "getRuntimeVersion")]
    async fn runtime_version(&self, at: Option<B256>) -> RpcResult<RpcRuntimeVersion>;
}
