//! Shared wire types and the error taxonomy for the gateway data-retrieval
//! and caching core.

pub mod attributes;
pub mod bucket;
pub mod clock;
pub mod error;
pub mod id;
pub mod interfaces;
pub mod weave;

pub use attributes::{
    BlockHeader, DataAttributes, DataParent, MetadataRecord, Region, RootTxLookup,
    VerificationPriority,
};
pub use bucket::TokenBucket;
pub use clock::now_ms;
pub use error::GatewayError;
pub use id::{sort_by_raw_bytes, ContentHash, Identifier};
pub use interfaces::{
    AttributesStore, BundleOffset, BundleOffsetSource, ChainClient, DataAttributesPatch,
    UnvalidatedChunk, UnvalidatedChunkSource,
};
pub use weave::{WeaveOffset, MAX_SAFE_INTEGER};
