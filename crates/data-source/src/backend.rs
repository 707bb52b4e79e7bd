//! Concrete backends in the composite chain (spec §4.2): local store,
//! trusted-gateway set, peer-supplied chunks, and on-chain tx data. Local
//! and peer-chunk backends live here; the trusted-gateway HTTP fetch lives
//! in [`crate::trusted_gateway`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;

use gateway_chunk_validator::validate_tx_path;
use gateway_primitives::{ChainClient, GatewayError, Region, UnvalidatedChunkSource, WeaveOffset};

use crate::request::{ByteStream, ContiguousData, DataRequest};

#[async_trait]
pub trait DataSourceBackend: Send + Sync {
    /// Stable tag matching `onDemandRetrievalOrder`/`backgroundRetrievalOrder`
    /// entries in [`gateway_config::GatewayConfig`] (`"local"`,
    /// `"trusted-gateway"`, `"peer-chunk"`, `"chain"`).
    fn tag(&self) -> &'static str;

    async fn get_data(&self, req: &DataRequest) -> Result<ContiguousData, GatewayError>;
}

/// What the "local" backend needs from the cache's own content store: a
/// hash-keyed lookup. Kept as a narrow trait here (rather than a dependency
/// on `gateway-content-cache`, which itself depends on this crate) so the
/// cache crate can implement it directly on its `FsContentStore`.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(
        &self,
        hash: gateway_primitives::ContentHash,
        region: Option<Region>,
    ) -> Result<Option<(ByteStream, u64)>, GatewayError>;
}

/// The composite chain's "local" entry (spec §4.2): serves bytes already on
/// disk, trusted by construction since content-store entries are
/// content-addressed.
pub struct LocalStoreBackend {
    store: Arc<dyn LocalStore>,
}

impl LocalStoreBackend {
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DataSourceBackend for LocalStoreBackend {
    fn tag(&self) -> &'static str {
        "local"
    }

    async fn get_data(&self, req: &DataRequest) -> Result<ContiguousData, GatewayError> {
        let attrs = req.attrs.as_ref();
        let hash = attrs
            .and_then(|a| a.hash)
            .ok_or_else(|| GatewayError::NotFound("local backend: no known hash".to_owned()))?;

        let Some((stream, size)) = self.store.get(hash, req.region).await? else {
            return Err(GatewayError::NotFound(format!(
                "local backend: hash {hash} not in store"
            )));
        };

        Ok(ContiguousData {
            stream,
            size,
            source_content_type: attrs.and_then(|a| a.content_type.clone()),
            verified: attrs.is_some_and(|a| a.verified),
            trusted: true,
            cached: true,
            request_attrs: req.request_attrs.clone(),
        })
    }
}

/// The composite chain's "peer-chunk" entry (spec §4.2: "peer chunks are
/// trusted only after validation — see §4.4"). Fetches an unvalidated chunk
/// plus its claimed `tx_path`, looks up the covering block, and runs the
/// Merkle validator before ever returning `trusted = true`.
pub struct PeerChunkBackend {
    chunk_source: Arc<dyn UnvalidatedChunkSource>,
    chain_client: Arc<dyn ChainClient>,
}

impl PeerChunkBackend {
    #[must_use]
    pub fn new(chunk_source: Arc<dyn UnvalidatedChunkSource>, chain_client: Arc<dyn ChainClient>) -> Self {
        Self { chunk_source, chain_client }
    }
}

#[async_trait]
impl DataSourceBackend for PeerChunkBackend {
    fn tag(&self) -> &'static str {
        "peer-chunk"
    }

    async fn get_data(&self, req: &DataRequest) -> Result<ContiguousData, GatewayError> {
        let attrs = req.attrs.as_ref();
        let offset = attrs
            .and_then(|a| a.offset)
            .ok_or_else(|| GatewayError::NotFound("peer-chunk backend: no weave offset".to_owned()))?;
        let weave_offset = WeaveOffset::from_u64(offset);

        let Some(unvalidated) = self.chunk_source.get_unvalidated_chunk(&weave_offset).await? else {
            return Err(GatewayError::NotFound(format!(
                "peer-chunk backend: no chunk at offset {offset}"
            )));
        };

        let tx_path = unvalidated.tx_path.as_deref().ok_or_else(|| {
            GatewayError::ValidationFailed("peer-chunk backend: chunk missing tx_path".to_owned())
        })?;

        let block = self
            .chain_client
            .binary_search_blocks(&weave_offset)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("peer-chunk backend: no block covers offset {offset}")))?;

        // Never mark a peer chunk trusted without a passing Merkle proof.
        validate_tx_path(tx_path, block.tx_root, &weave_offset, &block)?;

        let chunk = unvalidated.chunk;
        let size = chunk.len() as u64;
        let owned_stream: ByteStream = Box::pin(stream::once(async move { Ok(Bytes::from(chunk)) }));

        Ok(ContiguousData {
            stream: owned_stream,
            size,
            source_content_type: attrs.and_then(|a| a.content_type.clone()),
            verified: false,
            trusted: true,
            cached: false,
            request_attrs: req.request_attrs.clone(),
        })
    }
}
