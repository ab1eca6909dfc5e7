//! # cadence-chain
//!
//! The chain-facing half of the cadence ingestion pipeline.
//!
//! This crate defines the narrow capability surface the ingestion engine consumes from a
//! blockchain node: block headers with their parent linkage and consensus digest, block
//! timestamps, decoded runtime events, and a live stream of new heads. The engine never sees a
//! full client object, only the [`ChainSource`] trait and the types in this crate.
//!
//! ## Components
//!
//! - [`ChainKind`]: the closed set of chains cadence ingests.
//! - [`BlockHeader`], [`Block`], [`BlockEvent`], [`DigestItem`]: the data the engine consumes.
//! - [`ChainSource`]: the async capability trait.
//! - [`RpcChainSource`]: a WebSocket JSON-RPC implementation for substrate-style nodes.
//! - [`RetryingSource`]: wraps any source with bounded exponential backoff.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod chain;
pub use chain::ChainKind;

mod digest;
pub use digest::{ConsensusEngineId, DigestItem};

mod error;
pub use error::{SourceError, SourceResult};

mod types;
pub use types::{Block, BlockEvent, BlockHeader};

mod traits;
pub use traits::{ChainSource, HeadStream};

mod rpc;
pub use rpc::{
    ChainApiClient, RpcBlock, RpcChainSource, RpcDigest, RpcHeader, RpcRuntimeVersion,
    RpcSignedBlock, RuntimeDecoder, StateApiClient,
};

mod retry;
pub use retry::{RetryConfig, RetryingSource};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
