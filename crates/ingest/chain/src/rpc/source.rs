//! [`ChainSource`] over a WebSocket JSON-RPC connection.

use super::{
    api::{ChainApiClient, StateApiClient},
    runtime::RuntimeDecoder,
};
use crate::{Block, BlockEvent, BlockHeader, ChainSource, HeadStream, SourceError, SourceResult};
use alloy_primitives::{B256, Bytes, hex};
use async_trait::async_trait;
use futures::StreamExt;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use parity_scale_codec::DecodeAll;
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Storage key of `Timestamp::Now`: `twox128("Timestamp") ++ twox128("Now")`.
const TIMESTAMP_NOW_KEY: [u8; 32] =
    hex!("f0c365c3cf59d671eb72da0e7a4113c49f1f0515f462cdcf84e0f1d6045dfcbb");

/// Storage key of `System::Events`: `twox128("System") ++ twox128("Events")`.
const SYSTEM_EVENTS_KEY: [u8; 32] =
    hex!("26aa394eea5630e07c48ae0c9558cef780d41e5e16056765bc8461851072c9d7");

/// A [`ChainSource`] backed by a substrate node's WebSocket JSON-RPC endpoint.
///
/// The connection is re-established lazily: if a call finds the socket closed, the client is
/// rebuilt before the request is sent. Disconnects and reconnects are logged, never surfaced
/// as failures by themselves.
///
/// Events are decoded against the runtime metadata of the block's runtime. Metadata is fetched
/// once per runtime spec version and cached for the lifetime of the source.
#[derive(Clone)]
pub struct RpcChainSource {
    url: Url,
    request_timeout: Duration,
    client: Arc<RwLock<Arc<WsClient>>>,
    decoders: Arc<RwLock<HashMap<u32, Arc<RuntimeDecoder>>>>,
}

impl fmt::Debug for RpcChainSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcChainSource")
            .field("url", &self.url)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl RpcChainSource {
    /// Connects to the node at `url`.
    pub async fn connect(url: Url, request_timeout: Duration) -> SourceResult<Self> {
        let client = Self::build_client(&url, request_timeout).await?;
        info!(target: "rpc_source", %url, "Connected to chain RPC");
        Ok(Self {
            url,
            request_timeout,
            client: Arc::new(RwLock::new(Arc::new(client))),
            decoders: Default::default(),
        })
    }

    /// Returns the endpoint this source talks to.
    pub const fn url(&self) -> &Url {
        &self.url
    }

    async fn build_client(url: &Url, request_timeout: Duration) -> SourceResult<WsClient> {
        WsClientBuilder::default()
            .request_timeout(request_timeout)
            .build(url.as_str())
            .await
            .map_err(Into::into)
    }

    /// Returns a connected client, reconnecting first if the socket was closed.
    async fn client(&self) -> SourceResult<Arc<WsClient>> {
        {
            let current = self.client.read().await;
            if current.is_connected() {
                return Ok(Arc::clone(&current));
            }
        }

        let mut current = self.client.write().await;
        if current.is_connected() {
            return Ok(Arc::clone(&current));
        }

        warn!(target: "rpc_source", url = %self.url, "Chain RPC disconnected, reconnecting");
        let client = Arc::new(Self::build_client(&self.url, self.request_timeout).await?);
        *current = Arc::clone(&client);
        info!(target: "rpc_source", url = %self.url, "Reconnected to chain RPC");
        Ok(client)
    }

    /// Returns the decoder for the runtime active at `hash`, loading its metadata on first use.
    async fn decoder(&self, hash: B256) -> SourceResult<Arc<RuntimeDecoder>> {
        let client = self.client().await?;
        let spec_version = StateApiClient::runtime_version(&*client, Some(hash)).await?.spec_version;
        if let Some(decoder) = self.decoders.read().await.get(&spec_version) {
            return Ok(Arc::clone(decoder));
        }

        let metadata = StateApiClient::metadata(&*client, Some(hash)).await?;
        let decoder = Arc::new(RuntimeDecoder::from_metadata(&metadata)?);
        info!(target: "rpc_source", spec_version, %hash, "Loaded runtime metadata");
        self.decoders.write().await.insert(spec_version, Arc::clone(&decoder));
        Ok(decoder)
    }

    /// Reads the header at the canonical hash for `number`.
    async fn canonical_header(&self, number: u64) -> SourceResult<BlockHeader> {
        let hash = self.block_hash(number).await?;
        self.header(hash).await
    }
}

#[async_trait]
impl ChainSource for RpcChainSource {
    async fn tip_header(&self) -> SourceResult<BlockHeader> {
        let client = self.client().await?;
        let hash = ChainApiClient::block_hash(&*client, None)
            .await?
            .ok_or(SourceError::Rpc("node returned no best block hash".to_string()))?;
        self.header(hash).await
    }

    async fn block_hash(&self, number: u64) -> SourceResult<B256> {
        let client = self.client().await?;
        ChainApiClient::block_hash(&*client, Some(number))
            .await?
            .ok_or(SourceError::BlockNumberNotFound(number))
    }

    async fn header(&self, hash: B256) -> SourceResult<BlockHeader> {
        let client = self.client().await?;
        ChainApiClient::header(&*client, Some(hash))
            .await?
            .ok_or(SourceError::BlockHashNotFound(hash))?
            .into_header(hash)
    }

    async fn block(&self, hash: B256) -> SourceResult<Block> {
        let client = self.client().await?;
        let signed = ChainApiClient::block(&*client, Some(hash))
            .await?
            .ok_or(SourceError::BlockHashNotFound(hash))?;
        let header = signed.block.header.into_header(hash)?;
        let extrinsics = signed.block.extrinsics;

        // The inherent timestamp is best effort; callers fall back to `Timestamp::Now`.
        let inherent_timestamp_ms = match self.decoder(hash).await {
            Ok(decoder) => decoder.inherent_timestamp(&extrinsics),
            Err(err) => {
                debug!(target: "rpc_source", %hash, %err, "No runtime decoder for block");
                None
            }
        };
        Ok(Block { header, extrinsics, inherent_timestamp_ms })
    }

    async fn timestamp_ms(&self, hash: B256) -> SourceResult<u64> {
        let client = self.client().await?;
        let raw = StateApiClient::storage(
            &*client,
            Bytes::from_static(&TIMESTAMP_NOW_KEY),
            Some(hash),
        )
        .await?
        .ok_or(SourceError::TimestampMissing(hash))?;
        u64::decode_all(&mut raw.as_ref()).map_err(|e| SourceError::decode("timestamp", e))
    }

    async fn events(&self, hash: B256) -> SourceResult<Option<Vec<BlockEvent>>> {
        let decoder = self.decoder(hash).await?;
        let client = self.client().await?;
        let raw = StateApiClient::storage(
            &*client,
            Bytes::from_static(&SYSTEM_EVENTS_KEY),
            Some(hash),
        )
        .await?;
        match raw {
            Some(raw) => decoder.decode_events(&raw).map(Some),
            None => Ok(Some(Vec::new())),
        }
    }

    async fn subscribe_new_heads(&self) -> SourceResult<HeadStream> {
        let client = self.client().await?;
        let subscription = ChainApiClient::subscribe_new_heads(&*client).await?;
        debug!(target: "rpc_source", url = %self.url, "Subscribed to new heads");

        let source = self.clone();
        let heads = subscription.then(move |announced| {
            let source = source.clone();
            async move {
                let announced = announced.map_err(|e| SourceError::decode("new head", e))?;
                source.canonical_header(announced.number.to()).await
            }
        });
        Ok(heads.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parity_scale_codec::Encode;

    #[test]
    fn test_timestamp_key_layout() {
        assert_eq!(&TIMESTAMP_NOW_KEY[..4], &[0xf0, 0xc3, 0x65, 0xc3]);
        assert_eq!(&TIMESTAMP_NOW_KEY[28..], &[0x60, 0x45, 0xdf, 0xcb]);
    }

    #[test]
    fn test_events_key_layout() {
        assert_eq!(&SYSTEM_EVENTS_KEY[..4], &[0x26, 0xaa, 0x39, 0x4e]);
        assert_eq!(&SYSTEM_EVENTS_KEY[16..20], &[0x80, 0xd4, 0x1e, 0x5e]);
    }

    #[test]
    fn test_timestamp_value_decoding() {
        let encoded = 1_700_000_000_123u64.encode();
        assert_eq!(u64::decode_all(&mut encoded.as_slice()).unwrap(), 1_700_000_000_123);
    }
}
