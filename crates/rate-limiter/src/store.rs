//! A [`gateway_store::Database`]-backed bucket backend: the same
//! [`BucketBackend`] interface as [`crate::memory::InMemoryBucketBackend`],
//! but durable and shareable across processes through whatever `Database`
//! is wired in (the in-process `InMemoryDB`, or `gateway-store-rocksdb`),
//! persisted under `Column::RateLimitBuckets` (spec §4.5 "Backends").

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use gateway_primitives::{GatewayError, TokenBucket};
use gateway_store::{Column, Database, Slice};

use crate::backend::{BucketBackend, BucketParams, ConsumeOutcome};

/// The KV backends this core targets give no cross-key transaction, so a
/// single lock around load-modify-store keeps refill-then-consume atomic.
pub struct StoreBucketBackend {
    db: Arc<dyn Database>,
    lock: Mutex<()>,
}

impl StoreBucketBackend {
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            lock: Mutex::new(()),
        }
    }

    fn load(&self, key: &str) -> Result<Option<TokenBucket>, GatewayError> {
        let Some(value) = self
            .db
            .get(Column::RateLimitBuckets, Slice::from(key.as_bytes()))
            .map_err(|err| GatewayError::Internal(format!("bucket store: {err}")))?
        else {
            return Ok(None);
        };
        serde_json::from_slice(value.as_ref())
            .map(Some)
            .map_err(|err| GatewayError::Internal(format!("bucket store: corrupt record: {err}")))
    }

    fn store(&self, key: &str, bucket: &TokenBucket) -> Result<(), GatewayError> {
        let value = serde_json::to_vec(bucket)
            .map_err(|err| GatewayError::Internal(format!("bucket store: {err}")))?;
        self.db
            .put(Column::RateLimitBuckets, Slice::from(key.as_bytes().to_vec()), Slice::from(value))
            .map_err(|err| GatewayError::Internal(format!("bucket store: {err}")))
    }
}

#[async_trait]
impl BucketBackend for StoreBucketBackend {
    async fn consume(
        &self,
        key: &str,
        now_ms: u64,
        params: BucketParams,
        tokens_needed: f64,
    ) -> Result<ConsumeOutcome, GatewayError> {
        let _guard = self.lock.lock();
        let mut bucket = self
            .load(key)?
            .unwrap_or_else(|| TokenBucket::new(params.capacity, params.refill_rate_per_second, now_ms));
        bucket.refill(now_ms, params.effective_capacity);

        let outcome = if bucket.tokens_remaining >= tokens_needed {
            bucket.tokens_remaining -= tokens_needed;
            ConsumeOutcome {
                allowed: true,
                tokens_consumed: tokens_needed,
            }
        } else {
            ConsumeOutcome {
                allowed: false,
                tokens_consumed: 0.0,
            }
        };
        self.store(key, &bucket)?;
        Ok(outcome)
    }

    async fn rollback(&self, key: &str, tokens: f64) -> Result<(), GatewayError> {
        let _guard = self.lock.lock();
        if let Some(mut bucket) = self.load(key)? {
            bucket.tokens_remaining = (bucket.tokens_remaining + tokens).min(bucket.capacity);
            self.store(key, &bucket)?;
        }
        Ok(())
    }

    async fn adjust(
        &self,
        key: &str,
        now_ms: u64,
        params: BucketParams,
        signed_delta: f64,
    ) -> Result<(), GatewayError> {
        let _guard = self.lock.lock();
        let mut bucket = self
            .load(key)?
            .unwrap_or_else(|| TokenBucket::new(params.capacity, params.refill_rate_per_second, now_ms));
        bucket.refill(now_ms, params.effective_capacity);
        bucket.tokens_remaining = (bucket.tokens_remaining - signed_delta).clamp(0.0, bucket.capacity);
        self.store(key, &bucket)
    }

    async fn set_cached_content_length(&self, key: &str, bytes: u64) -> Result<(), GatewayError> {
        let _guard = self.lock.lock();
        if let Some(mut bucket) = self.load(key)? {
            bucket.cached_content_length_bytes = Some(bytes);
            self.store(key, &bucket)?;
        }
        Ok(())
    }

    async fn cached_content_length(&self, key: &str) -> Result<Option<u64>, GatewayError> {
        Ok(self.load(key)?.and_then(|bucket| bucket.cached_content_length_bytes))
    }
}

#[cfg(test)]
mod tests {
    use gateway_store::InMemoryDB;

    use super::*;

    fn params() -> BucketParams {
        BucketParams {
            capacity: 10.0,
            refill_rate_per_second: 1.0,
            effective_capacity: 10.0,
        }
    }

    fn backend() -> StoreBucketBackend {
        StoreBucketBackend::new(Arc::new(InMemoryDB::new()))
    }

    #[tokio::test]
    async fn consume_creates_bucket_at_full_capacity() {
        let backend = backend();
        let outcome = backend.consume("k", 0, params(), 3.0).await.unwrap();
        assert!(outcome.allowed);
        assert_eq!(outcome.tokens_consumed, 3.0);
    }

    #[tokio::test]
    async fn denies_when_insufficient_and_leaves_bucket_untouched() {
        let backend = backend();
        backend.consume("k", 0, params(), 9.0).await.unwrap();
        let outcome = backend.consume("k", 0, params(), 5.0).await.unwrap();
        assert!(!outcome.allowed);
        assert_eq!(outcome.tokens_consumed, 0.0);
    }

    #[tokio::test]
    async fn rollback_restores_tokens_without_exceeding_capacity() {
        let backend = backend();
        backend.consume("k", 0, params(), 4.0).await.unwrap();
        backend.rollback("k", 4.0).await.unwrap();
        let outcome = backend.consume("k", 0, params(), 10.0).await.unwrap();
        assert!(outcome.allowed);
    }

    #[tokio::test]
    async fn state_survives_across_backend_instances_sharing_a_database() {
        let db = Arc::new(InMemoryDB::new());
        let first = StoreBucketBackend::new(db.clone());
        first.consume("k", 0, params(), 6.0).await.unwrap();

        let second = StoreBucketBackend::new(db);
        let outcome = second.consume("k", 0, params(), 4.0).await.unwrap();
        assert!(outcome.allowed, "second handle should see the first handle's persisted state");
        let denied = second.consume("k", 0, params(), 1.0).await.unwrap();
        assert!(!denied.allowed, "bucket should now be exhausted");
    }

    #[tokio::test]
    async fn cached_content_length_round_trips() {
        let backend = backend();
        backend.consume("k", 0, params(), 1.0).await.unwrap();
        assert_eq!(backend.cached_content_length("k").await.unwrap(), None);
        backend.set_cached_content_length("k", 4096).await.unwrap();
        assert_eq!(backend.cached_content_length("k").await.unwrap(), Some(4096));
    }
}
