//! Two-phase consume with rollback, and post-response adjustment (spec
//! §4.5). Orchestrates a resource bucket and an IP bucket over a shared
//! [`BucketBackend`].

use std::net::IpAddr;
use std::sync::Arc;

use tracing::warn;

use gateway_config::RateLimitConfig;
use gateway_primitives::GatewayError;
use gateway_telemetry::Metrics;

use crate::backend::{tokens_for_bytes, BucketBackend, BucketParams};
use crate::key::{canonicalize_host, canonicalize_path, ip_bucket_key, resource_bucket_key};

#[derive(Clone, Debug)]
pub struct LimitRequest {
    pub method: String,
    pub base_url: String,
    pub path: String,
    pub host: String,
    pub caller_ips: Vec<IpAddr>,
    pub tokens_hint: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketKind {
    Resource,
    Ip,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LimitOutcome {
    pub allowed: bool,
    pub limit_type: Option<BucketKind>,
    pub cached_content_length: Option<u64>,
    pub resource_tokens_consumed: f64,
    pub ip_tokens_consumed: f64,
}

impl LimitOutcome {
    fn allowlisted() -> Self {
        Self {
            allowed: true,
            limit_type: None,
            cached_content_length: None,
            resource_tokens_consumed: 0.0,
            ip_tokens_consumed: 0.0,
        }
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    backend: Arc<dyn BucketBackend>,
    metrics: Arc<Metrics>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig, backend: Arc<dyn BucketBackend>, metrics: Arc<Metrics>) -> Self {
        Self { config, backend, metrics }
    }

    fn resource_params(&self, payment_presented: bool) -> BucketParams {
        let multiplier = if payment_presented {
            self.config.capacity_multiplier
        } else {
            1.0
        };
        BucketParams {
            capacity: self.config.resource_capacity,
            refill_rate_per_second: self.config.resource_refill_rate,
            effective_capacity: self.config.resource_capacity * multiplier,
        }
    }

    fn ip_params(&self, payment_presented: bool) -> BucketParams {
        let multiplier = if payment_presented {
            self.config.capacity_multiplier
        } else {
            1.0
        };
        BucketParams {
            capacity: self.config.ip_capacity,
            refill_rate_per_second: self.config.ip_refill_rate,
            effective_capacity: self.config.ip_capacity * multiplier,
        }
    }

    /// Admits or denies `req`. If any caller IP is in the configured
    /// allowlist the request is admitted without touching either bucket.
    pub async fn check_limit(
        &self,
        req: &LimitRequest,
        now_ms: u64,
        payment_presented: bool,
    ) -> Result<LimitOutcome, GatewayError> {
        let result = self.check_limit_inner(req, now_ms, payment_presented).await;
        if let Err(err) = &result {
            gateway_telemetry::record_error(&self.metrics, err);
        }
        result
    }

    async fn check_limit_inner(
        &self,
        req: &LimitRequest,
        now_ms: u64,
        payment_presented: bool,
    ) -> Result<LimitOutcome, GatewayError> {
        if req.caller_ips.iter().any(|ip| self.config.allows(*ip)) {
            return Ok(LimitOutcome::allowlisted());
        }

        let canonical_path = canonicalize_path(&req.base_url, &req.path);
        let canonical_host = canonicalize_host(&req.host);
        let resource_key = resource_bucket_key(&req.method, &canonical_host, &canonical_path);

        let cached_length = self.backend.cached_content_length(&resource_key).await?;
        let predicted = cached_length
            .map(tokens_for_bytes)
            .unwrap_or_else(|| req.tokens_hint.unwrap_or(1.0).max(1.0));

        let resource_outcome = self
            .backend
            .consume(
                &resource_key,
                now_ms,
                self.resource_params(payment_presented),
                predicted,
            )
            .await?;
        if !resource_outcome.allowed {
            return Ok(LimitOutcome {
                allowed: false,
                limit_type: Some(BucketKind::Resource),
                cached_content_length: cached_length,
                resource_tokens_consumed: 0.0,
                ip_tokens_consumed: 0.0,
            });
        }

        let Some(ip) = req.caller_ips.first() else {
            return Ok(LimitOutcome {
                allowed: true,
                limit_type: None,
                cached_content_length: cached_length,
                resource_tokens_consumed: resource_outcome.tokens_consumed,
                ip_tokens_consumed: 0.0,
            });
        };
        let ip_key = ip_bucket_key(*ip);
        let ip_outcome = self
            .backend
            .consume(&ip_key, now_ms, self.ip_params(payment_presented), predicted)
            .await?;
        if !ip_outcome.allowed {
            if let Err(err) = self
                .backend
                .rollback(&resource_key, resource_outcome.tokens_consumed)
                .await
            {
                warn!(error = %err, key = %resource_key, "failed to roll back resource bucket after IP denial");
            }
            return Ok(LimitOutcome {
                allowed: false,
                limit_type: Some(BucketKind::Ip),
                cached_content_length: cached_length,
                resource_tokens_consumed: 0.0,
                ip_tokens_consumed: 0.0,
            });
        }

        Ok(LimitOutcome {
            allowed: true,
            limit_type: None,
            cached_content_length: cached_length,
            resource_tokens_consumed: resource_outcome.tokens_consumed,
            ip_tokens_consumed: ip_outcome.tokens_consumed,
        })
    }

    /// Best-effort post-response reconciliation; failures are logged and
    /// never surfaced to the caller (spec §4.5 "Adjust").
    pub async fn adjust_tokens(
        &self,
        req: &LimitRequest,
        now_ms: u64,
        response_bytes: u64,
        initial_resource_tokens: f64,
        initial_ip_tokens: f64,
    ) {
        let canonical_path = canonicalize_path(&req.base_url, &req.path);
        let canonical_host = canonicalize_host(&req.host);
        let resource_key = resource_bucket_key(&req.method, &canonical_host, &canonical_path);
        let actual = tokens_for_bytes(response_bytes);

        if let Err(err) = self
            .backend
            .adjust(
                &resource_key,
                now_ms,
                self.resource_params(false),
                actual - initial_resource_tokens,
            )
            .await
        {
            warn!(error = %err, key = %resource_key, "resource bucket adjust failed");
        }
        if let Err(err) = self
            .backend
            .set_cached_content_length(&resource_key, response_bytes)
            .await
        {
            warn!(error = %err, key = %resource_key, "failed to record cached content length");
        }

        if let Some(ip) = req.caller_ips.first() {
            let ip_key = ip_bucket_key(*ip);
            if let Err(err) = self
                .backend
                .adjust(&ip_key, now_ms, self.ip_params(false), actual - initial_ip_tokens)
                .await
            {
                warn!(error = %err, key = %ip_key, "ip bucket adjust failed");
            }
        }
    }
}
