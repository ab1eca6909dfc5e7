//! JSON-RPC access to substrate-style nodes.

mod api;
pub use api::{
    ChainApiClient, RpcBlock, RpcDigest, RpcHeader, RpcRuntimeVersion, RpcSignedBlock,
    StateApiClient,
};

mod runtime;
pub use runtime::RuntimeDecoder;

mod source;
pub use source::RpcChainSource;
