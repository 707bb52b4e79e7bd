//! In-memory bucket backend: a `DashMap` of per-key mutexes with LRU
//! eviction at a configured cap (spec §4.5 "Backends").

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use gateway_primitives::{GatewayError, TokenBucket};

use crate::backend::{BucketBackend, BucketParams, ConsumeOutcome};

pub struct InMemoryBucketBackend {
    cap: usize,
    buckets: DashMap<String, Mutex<TokenBucket>>,
    recency: Mutex<VecDeque<String>>,
}

impl InMemoryBucketBackend {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            buckets: DashMap::new(),
            recency: Mutex::new(VecDeque::new()),
        }
    }

    fn touch(&self, key: &str) {
        let mut recency = self.recency.lock();
        recency.push_back(key.to_owned());
        if recency.len() > self.cap.saturating_mul(4).max(16) {
            recency.pop_front();
        }
        while self.buckets.len() > self.cap {
            let Some(oldest) = recency.pop_front() else {
                break;
            };
            if oldest != key {
                self.buckets.remove(&oldest);
            }
        }
    }

    fn with_bucket<R>(
        &self,
        key: &str,
        now_ms: u64,
        params: BucketParams,
        f: impl FnOnce(&mut TokenBucket) -> R,
    ) -> R {
        self.touch(key);
        let entry = self
            .buckets
            .entry(key.to_owned())
            .or_insert_with(|| Mutex::new(TokenBucket::new(params.capacity, params.refill_rate_per_second, now_ms)));
        let mut bucket = entry.value().lock();
        bucket.refill(now_ms, params.effective_capacity);
        f(&mut bucket)
    }
}

#[async_trait]
impl BucketBackend for InMemoryBucketBackend {
    async fn consume(
        &self,
        key: &str,
        now_ms: u64,
        params: BucketParams,
        tokens_needed: f64,
    ) -> Result<ConsumeOutcome, GatewayError> {
        Ok(self.with_bucket(key, now_ms, params, |bucket| {
            if bucket.tokens_remaining >= tokens_needed {
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
            }
        }))
    }

    async fn rollback(&self, key: &str, tokens: f64) -> Result<(), GatewayError> {
        if let Some(entry) = self.buckets.get(key) {
            let mut bucket = entry.value().lock();
            bucket.tokens_remaining = (bucket.tokens_remaining + tokens).min(bucket.capacity);
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
        self.with_bucket(key, now_ms, params, |bucket| {
            bucket.tokens_remaining = (bucket.tokens_remaining - signed_delta)
                .clamp(0.0, bucket.capacity);
        });
        Ok(())
    }

    async fn set_cached_content_length(&self, key: &str, bytes: u64) -> Result<(), GatewayError> {
        if let Some(entry) = self.buckets.get(key) {
            entry.value().lock().cached_content_length_bytes = Some(bytes);
        }
        Ok(())
    }

    async fn cached_content_length(&self, key: &str) -> Result<Option<u64>, GatewayError> {
        Ok(self
            .buckets
            .get(key)
            .and_then(|entry| entry.value().lock().cached_content_length_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BucketParams {
        BucketParams {
            capacity: 10.0,
            refill_rate_per_second: 1.0,
            effective_capacity: 10.0,
        }
    }

    #[tokio::test]
    async fn consume_creates_bucket_at_full_capacity() {
        let backend = InMemoryBucketBackend::new(100);
        let outcome = backend.consume("k", 0, params(), 3.0).await.unwrap();
        assert!(outcome.allowed);
        assert_eq!(outcome.tokens_consumed, 3.0);
    }

    #[tokio::test]
    async fn denies_when_insufficient_and_leaves_bucket_untouched() {
        let backend = InMemoryBucketBackend::new(100);
        backend.consume("k", 0, params(), 9.0).await.unwrap();
        let outcome = backend.consume("k", 0, params(), 5.0).await.unwrap();
        assert!(!outcome.allowed);
        assert_eq!(outcome.tokens_consumed, 0.0);
    }

    #[tokio::test]
    async fn rollback_restores_tokens_without_exceeding_capacity() {
        let backend = InMemoryBucketBackend::new(100);
        backend.consume("k", 0, params(), 4.0).await.unwrap();
        backend.rollback("k", 4.0).await.unwrap();
        let outcome = backend.consume("k", 0, params(), 10.0).await.unwrap();
        assert!(outcome.allowed);
    }

    #[tokio::test]
    async fn evicts_least_recently_used_key_beyond_cap() {
        let backend = InMemoryBucketBackend::new(2);
        backend.consume("a", 0, params(), 1.0).await.unwrap();
        backend.consume("b", 0, params(), 1.0).await.unwrap();
        backend.consume("c", 0, params(), 1.0).await.unwrap();
        assert!(backend.buckets.len() <= 2);
    }

    #[tokio::test]
    async fn cached_content_length_round_trips() {
        let backend = InMemoryBucketBackend::new(100);
        backend.consume("k", 0, params(), 1.0).await.unwrap();
        assert_eq!(backend.cached_content_length("k").await.unwrap(), None);
        backend.set_cached_content_length("k", 4096).await.unwrap();
        assert_eq!(backend.cached_content_length("k").await.unwrap(), Some(4096));
    }
}
