//! Tracing initialization and the metrics registry consumed by the other
//! core crates. Modeled on the teacher's `crates/context/src/metrics.rs`;
//! exporting these counters over HTTP is an external collaborator's job
//! (spec §1 names "telemetry exporters" out of scope).

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

use gateway_primitives::GatewayError;

/// Installs a global `tracing` subscriber honoring `RUST_LOG`/`GATEWAY_LOG`.
/// Idempotent: safe to call more than once in a test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .try_init();
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResultLabel {
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BackendLabel {
    pub backend: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BucketLabel {
    pub bucket: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorClassLabel {
    pub class: String,
}

#[derive(Clone, Debug)]
pub struct Metrics {
    pub cache_requests: Family<ResultLabel, Counter>,
    pub cache_finalizations: Family<ResultLabel, Counter>,
    pub resolver_depth: Histogram,
    pub backend_attempts: Family<BackendLabel, Counter>,
    pub backend_failures: Family<BackendLabel, Counter>,
    pub ratelimit_denied: Family<BucketLabel, Counter>,
    pub errors_by_class: Family<ErrorClassLabel, Counter>,
}

impl Metrics {
    pub fn new(registry: &mut Registry) -> Self {
        let gateway_registry = registry.sub_registry_with_prefix("gateway");

        let cache_requests = Family::<ResultLabel, Counter>::default();
        gateway_registry.register(
            "cache_requests",
            "Cache lookups by hit/miss result",
            cache_requests.clone(),
        );

        let cache_finalizations = Family::<ResultLabel, Counter>::default();
        gateway_registry.register(
            "cache_finalizations",
            "Cache write finalize attempts by finalized/discarded result",
            cache_finalizations.clone(),
        );

        let resolver_depth =
            Histogram::new(exponential_buckets(1.0, 2.0, 5));
        gateway_registry.register(
            "resolver_depth",
            "Number of parent-chain hops walked by the root-parent resolver",
            resolver_depth.clone(),
        );

        let backend_attempts = Family::<BackendLabel, Counter>::default();
        gateway_registry.register(
            "backend_attempts",
            "Composite data source attempts per backend",
            backend_attempts.clone(),
        );

        let backend_failures = Family::<BackendLabel, Counter>::default();
        gateway_registry.register(
            "backend_failures",
            "Composite data source failures per backend",
            backend_failures.clone(),
        );

        let ratelimit_denied = Family::<BucketLabel, Counter>::default();
        gateway_registry.register(
            "ratelimit_denied",
            "Rate limiter denials by bucket kind",
            ratelimit_denied.clone(),
        );

        let errors_by_class = Family::<ErrorClassLabel, Counter>::default();
        gateway_registry.register(
            "errors",
            "Per-error-class counters (spec §4.1 failure semantics)",
            errors_by_class.clone(),
        );

        Self {
            cache_requests,
            cache_finalizations,
            resolver_depth,
            backend_attempts,
            backend_failures,
            ratelimit_denied,
            errors_by_class,
        }
    }

    /// A `Metrics` with its own private registry, for callers that have
    /// nowhere to export a registry but still want the counters bumped
    /// (e.g. a core crate's own tests).
    #[must_use]
    pub fn standalone() -> Self {
        Self::new(&mut Registry::default())
    }
}

/// Bumps the per-error-class counter for `err` (spec §4.1 "Failure
/// semantics"). Core crates call this at their public entry points so every
/// `GatewayError` they return is also counted.
pub fn record_error(metrics: &Metrics, err: &GatewayError) {
    metrics
        .errors_by_class
        .get_or_create(&ErrorClassLabel {
            class: err.metric_label().to_owned(),
        })
        .inc();
}
