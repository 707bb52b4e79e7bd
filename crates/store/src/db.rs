//! Generic `Database` trait implemented by both [`crate::memory::InMemoryDB`]
//! and the RocksDB backend in `gateway-store-rocksdb`.

use thiserror::Error;

use crate::slice::Slice;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    /// Content-hash-keyed [`gateway_primitives::MetadataRecord`] blobs.
    Metadata,
    /// Token-bucket state, keyed by resource/IP bucket key (spec §4.5).
    RateLimitBuckets,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),
}

pub trait Database: Send + Sync {
    fn get<'a>(&'a self, column: Column, key: Slice<'_>) -> Result<Option<Slice<'a>>, StoreError>;

    fn has(&self, column: Column, key: Slice<'_>) -> Result<bool, StoreError> {
        Ok(self.get(column, key)?.is_some())
    }

    fn put(&self, column: Column, key: Slice<'_>, value: Slice<'_>) -> Result<(), StoreError>;

    fn delete(&self, column: Column, key: Slice<'_>) -> Result<(), StoreError>;

    /// Snapshot of all entries in `column`, sorted by key. Small enough
    /// tables (metadata, rate-limit buckets) don't need a streaming cursor.
    fn entries(&self, column: Column) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, StoreError>;
}
