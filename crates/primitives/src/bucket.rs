//! Token bucket state (spec §3). The refill/consume/rollback logic lives in
//! `gateway-rate-limiter`; this crate only carries the shared shape so both
//! the in-memory and remote backends agree on field names for (de)serialization.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenBucket {
    pub capacity: f64,
    pub tokens_remaining: f64,
    pub refill_rate_per_second: f64,
    pub last_refill_at_ms: u64,
    pub cached_content_length_bytes: Option<u64>,
}

impl TokenBucket {
    #[must_use]
    pub fn new(capacity: f64, refill_rate_per_second: f64, now_ms: u64) -> Self {
        Self {
            capacity,
            tokens_remaining: capacity,
            refill_rate_per_second,
            last_refill_at_ms: now_ms,
            cached_content_length_bytes: None,
        }
    }

    /// `tokensRemaining = min(capacity, tokensRemaining + elapsed_s * refillRate)` (spec §3).
    pub fn refill(&mut self, now_ms: u64, effective_capacity: f64) {
        if now_ms > self.last_refill_at_ms {
            let elapsed_s = (now_ms - self.last_refill_at_ms) as f64 / 1000.0;
            self.tokens_remaining =
                (self.tokens_remaining + elapsed_s * self.refill_rate_per_second)
                    .min(effective_capacity);
            self.last_refill_at_ms = now_ms;
        }
    }
}
