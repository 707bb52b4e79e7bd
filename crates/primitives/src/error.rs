//! Error taxonomy for the gateway data-retrieval core (spec §7).
//!
//! Every public operation in the core returns `Result<T, GatewayError>`.
//! Fire-and-forget paths (metadata touch, attribute persist, token-adjust)
//! are expected to log and discard these, never propagate them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Id unknown, hash absent from the store, or offset beyond the chain.
    #[error("not found: {0}")]
    NotFound(String),

    /// Region exceeds data size, or arithmetic exceeds the machine-integer limit.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Merkle hash mismatch, end-of-stream size mismatch, or a bundled item
    /// absent from its claimed root.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Backend timeout, connection error, or HTTP 5xx.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Resource or IP bucket denied admission.
    #[error("rate limited by {bucket}")]
    RateLimited { bucket: &'static str },

    /// Request was cancelled or exceeded its deadline.
    #[error("cancelled")]
    Cancelled,

    /// I/O error on the cache/metadata/content store, or a programmer error
    /// (e.g. a hash without a size).
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Classifies an error for the composite data source's failover policy
    /// (spec §4.2/§7): only these two kinds cause the next backend to be tried.
    #[must_use]
    pub fn is_retryable_by_composite_source(&self) -> bool {
        matches!(
            self,
            GatewayError::NotFound(_) | GatewayError::UpstreamUnavailable(_)
        )
    }

    /// Stable label used for the per-error-class counter (spec §4.1 "Failure semantics").
    #[must_use]
    pub const fn metric_label(&self) -> &'static str {
        match self {
            GatewayError::NotFound(_) => "not_found",
            GatewayError::OutOfRange(_) => "out_of_range",
            GatewayError::ValidationFailed(_) => "validation_failed",
            GatewayError::UpstreamUnavailable(_) => "upstream_unavailable",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::Cancelled => "cancelled",
            GatewayError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Internal(format!("io error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_match_spec() {
        assert!(GatewayError::NotFound("x".into()).is_retryable_by_composite_source());
        assert!(GatewayError::UpstreamUnavailable("x".into()).is_retryable_by_composite_source());
        assert!(!GatewayError::ValidationFailed("x".into()).is_retryable_by_composite_source());
        assert!(!GatewayError::RateLimited { bucket: "ip" }.is_retryable_by_composite_source());
    }
}
