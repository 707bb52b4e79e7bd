//! Read-through contiguous-data cache (spec §4.1): content-addressed storage
//! keyed by SHA-256, MRU-tracked metadata, and a tee pipeline that forks
//! upstream bytes to both the caller and the cache writer.

pub mod cache;
pub mod content_store;
pub mod metadata;

pub use cache::{ContentCache, UpstreamSource};
pub use content_store::{ContentStore, FsContentStore, WriteHandle};
pub use metadata::MetadataStore;
