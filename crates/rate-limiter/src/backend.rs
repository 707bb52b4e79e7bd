//! The backend interface both bucket stores implement (spec §4.5, §9 "lock
//! discipline around rollback"): refill/check/consume must be a single
//! atomic step, and adjustments are expressed as a signed delta rather than
//! a separate check-then-decrement pair, so a remote KV backend can
//! implement it as one round trip.

use async_trait::async_trait;

use gateway_primitives::GatewayError;

/// Capacity and refill parameters for one bucket kind, read from
/// [`gateway_config::RateLimitConfig`] by the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BucketParams {
    pub capacity: f64,
    pub refill_rate_per_second: f64,
    /// `capacity * capacityMultiplier` when an x402 payment receipt was
    /// presented, else equal to `capacity` (spec §4.5).
    pub effective_capacity: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConsumeOutcome {
    pub allowed: bool,
    pub tokens_consumed: f64,
}

#[async_trait]
pub trait BucketBackend: Send + Sync {
    /// Refills the named bucket to `now_ms`, then atomically checks and
    /// consumes `tokens_needed` if available. Creates the bucket at full
    /// capacity on first use.
    async fn consume(
        &self,
        key: &str,
        now_ms: u64,
        params: BucketParams,
        tokens_needed: f64,
    ) -> Result<ConsumeOutcome, GatewayError>;

    /// Adds `tokens` back to the bucket without a refill step, undoing a
    /// prior `consume` (spec §4.5 "two-phase consume").
    async fn rollback(&self, key: &str, tokens: f64) -> Result<(), GatewayError>;

    /// Applies a signed delta (positive: consume more, negative: return
    /// tokens) as one atomic step (spec §4.5 "Adjust").
    async fn adjust(&self, key: &str, now_ms: u64, params: BucketParams, signed_delta: f64)
        -> Result<(), GatewayError>;

    async fn set_cached_content_length(&self, key: &str, bytes: u64) -> Result<(), GatewayError>;

    async fn cached_content_length(&self, key: &str) -> Result<Option<u64>, GatewayError>;
}

/// `max(1, ceil(bytes / 1024))` (spec §4.5, used for both the prediction
/// fallback and the post-response actual-token computation).
#[must_use]
pub fn tokens_for_bytes(bytes: u64) -> f64 {
    ((bytes as f64) / 1024.0).ceil().max(1.0)
}
