//! Consumed interfaces (spec §6): small contracts this core relies on but
//! does not own. External collaborators (indexers, the chain client, peer
//! gossip) implement these; the core only ever holds a trait object.

use async_trait::async_trait;

use crate::attributes::{BlockHeader, DataAttributes, DataParent, RootTxLookup, VerificationPriority};
use crate::error::GatewayError;
use crate::id::{ContentHash, Identifier};
use crate::weave::WeaveOffset;

/// Fields the cache and resolver may persist back onto a logical id.
/// Absent fields are left untouched (spec §4.1 "enqueue a content-attributes
/// update", §4.3 "persist the discovered offsets").
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataAttributesPatch {
    pub data_root: Option<[u8; 32]>,
    pub hash: Option<ContentHash>,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub cached_at_ms: Option<u64>,
    pub verified: Option<bool>,
    pub verification_priority: Option<VerificationPriority>,
    pub root_transaction_id: Option<Identifier>,
    pub root_data_item_offset: Option<u64>,
    pub root_data_offset: Option<u64>,
}

#[async_trait]
pub trait AttributesStore: Send + Sync {
    async fn get_data_attributes(
        &self,
        id: &Identifier,
    ) -> Result<Option<DataAttributes>, GatewayError>;

    async fn get_data_parent(&self, id: &Identifier) -> Result<Option<DataParent>, GatewayError>;

    async fn set_data_attributes(
        &self,
        id: &Identifier,
        partial: DataAttributesPatch,
    ) -> Result<(), GatewayError>;

    async fn get_root_tx(&self, id: &Identifier) -> Result<Option<RootTxLookup>, GatewayError>;
}

/// Result of the legacy bundle-envelope parse (spec §4.3 step 3).
#[derive(Clone, Debug, PartialEq)]
pub struct BundleOffset {
    pub item_offset: u64,
    pub data_offset: u64,
    pub item_size: u64,
    pub data_size: u64,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait BundleOffsetSource: Send + Sync {
    async fn get_data_item_offset(
        &self,
        item_id: &Identifier,
        root_tx_id: &Identifier,
    ) -> Result<Option<BundleOffset>, GatewayError>;
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn binary_search_blocks(
        &self,
        absolute_offset: &WeaveOffset,
    ) -> Result<Option<BlockHeader>, GatewayError>;

    async fn get_block_by_height(&self, height: u64) -> Result<Option<BlockHeader>, GatewayError>;
}

/// A chunk contributed by a peer, not yet proven to sit under any
/// `tx_root` (spec §4.2, §4.4).
#[derive(Clone, Debug, PartialEq)]
pub struct UnvalidatedChunk {
    pub tx_path: Option<Vec<u8>>,
    pub data_path: Option<Vec<u8>>,
    pub chunk: Vec<u8>,
    pub source: String,
}

#[async_trait]
pub trait UnvalidatedChunkSource: Send + Sync {
    async fn get_unvalidated_chunk(
        &self,
        offset: &WeaveOffset,
    ) -> Result<Option<UnvalidatedChunk>, GatewayError>;
}
