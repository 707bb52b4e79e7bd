//! Ordered fallback across backends (spec §4.2). The first backend that
//! yields a stream owns the request; a backend is tried only after its
//! predecessor failed with a retryable error.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use gateway_config::GatewayConfig;
use gateway_primitives::GatewayError;
use gateway_telemetry::Metrics;

use crate::backend::DataSourceBackend;
use crate::request::{ContiguousData, DataRequest};

pub struct CompositeDataSource {
    on_demand_order: Vec<Arc<dyn DataSourceBackend>>,
    background_order: Vec<Arc<dyn DataSourceBackend>>,
    max_hop_count: u32,
    metrics: Arc<Metrics>,
}

impl CompositeDataSource {
    #[must_use]
    pub fn new(
        on_demand_order: Vec<Arc<dyn DataSourceBackend>>,
        background_order: Vec<Arc<dyn DataSourceBackend>>,
        max_hop_count: u32,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            on_demand_order,
            background_order,
            max_hop_count,
            metrics,
        }
    }

    /// Builds the two orderings from `config`'s tag lists, looking each tag
    /// up in `backends` (keyed by [`DataSourceBackend::tag`]). Unknown tags
    /// are skipped with a warning rather than failing construction, since a
    /// deployment may configure a backend tag this build doesn't wire up.
    #[must_use]
    pub fn from_config(
        config: &GatewayConfig,
        backends: &HashMap<&'static str, Arc<dyn DataSourceBackend>>,
        max_hop_count: u32,
        metrics: Arc<Metrics>,
    ) -> Self {
        let resolve = |tags: &[String]| -> Vec<Arc<dyn DataSourceBackend>> {
            tags.iter()
                .filter_map(|tag| match backends.get(tag.as_str()) {
                    Some(backend) => Some(backend.clone()),
                    None => {
                        warn!(tag, "composite source: no backend registered for configured tag");
                        None
                    }
                })
                .collect()
        };
        Self {
            on_demand_order: resolve(&config.on_demand_retrieval_order),
            background_order: resolve(&config.background_retrieval_order),
            max_hop_count,
            metrics,
        }
    }

    pub async fn get_data(
        &self,
        req: &DataRequest,
        background: bool,
    ) -> Result<ContiguousData, GatewayError> {
        let result = self.get_data_inner(req, background).await;
        if let Err(err) = &result {
            gateway_telemetry::record_error(&self.metrics, err);
        }
        result
    }

    async fn get_data_inner(
        &self,
        req: &DataRequest,
        background: bool,
    ) -> Result<ContiguousData, GatewayError> {
        let hop_count = req
            .request_attrs
            .as_ref()
            .map(|attrs| attrs.hop_count)
            .unwrap_or(0);
        if hop_count >= self.max_hop_count {
            return Err(GatewayError::OutOfRange(format!(
                "hop count {hop_count} reached max_hop_count={}",
                self.max_hop_count
            )));
        }

        let order = if background {
            &self.background_order
        } else {
            &self.on_demand_order
        };

        let mut last_err: Option<GatewayError> = None;
        for backend in order {
            debug!(id = %req.id, backend = backend.tag(), "composite source: trying backend");
            match backend.get_data(req).await {
                Ok(data) => return Ok(data),
                Err(err) if err.is_retryable_by_composite_source() => {
                    warn!(id = %req.id, backend = backend.tag(), error = %err, "backend failed, trying next");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            GatewayError::NotFound(format!("no backend configured for {}", req.id))
        }))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::stream;

    use super::*;

    struct FixedBackend {
        tag: &'static str,
        result: fn() -> Result<(), GatewayError>,
    }

    #[async_trait]
    impl DataSourceBackend for FixedBackend {
        fn tag(&self) -> &'static str {
            self.tag
        }

        async fn get_data(&self, _req: &DataRequest) -> Result<ContiguousData, GatewayError> {
            (self.result)()?;
            Ok(ContiguousData {
                stream: Box::pin(stream::once(async { Ok(bytes::Bytes::from_static(b"ok")) })),
                size: 2,
                source_content_type: None,
                verified: false,
                trusted: true,
                cached: false,
                request_attrs: None,
            })
        }
    }

    fn request() -> DataRequest {
        DataRequest {
            id: gateway_primitives::Identifier::from_bytes([1; 32]),
            attrs: None,
            request_attrs: None,
            region: None,
        }
    }

    fn test_metrics() -> Arc<Metrics> {
        Arc::new(Metrics::standalone())
    }

    #[tokio::test]
    async fn first_backend_that_succeeds_owns_the_request() {
        let local = Arc::new(FixedBackend {
            tag: "local",
            result: || Ok(()),
        });
        let chain = Arc::new(FixedBackend {
            tag: "chain",
            result: || Ok(()),
        });
        let source = CompositeDataSource::new(vec![local, chain], vec![], 10, test_metrics());
        let data = source.get_data(&request(), false).await.unwrap();
        assert_eq!(data.size, 2);
    }

    #[tokio::test]
    async fn falls_through_retryable_failures_to_the_next_backend() {
        let local = Arc::new(FixedBackend {
            tag: "local",
            result: || Err(GatewayError::NotFound("miss".into())),
        });
        let chain = Arc::new(FixedBackend {
            tag: "chain",
            result: || Ok(()),
        });
        let source = CompositeDataSource::new(vec![local, chain], vec![], 10, test_metrics());
        let data = source.get_data(&request(), false).await.unwrap();
        assert_eq!(data.size, 2);
    }

    #[tokio::test]
    async fn non_retryable_failure_aborts_immediately() {
        let local = Arc::new(FixedBackend {
            tag: "local",
            result: || Err(GatewayError::ValidationFailed("bad hash".into())),
        });
        let chain = Arc::new(FixedBackend {
            tag: "chain",
            result: || Ok(()),
        });
        let source = CompositeDataSource::new(vec![local, chain], vec![], 10, test_metrics());
        let err = source.get_data(&request(), false).await.unwrap_err();
        assert!(matches!(err, GatewayError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn exhausting_all_backends_surfaces_the_last_error() {
        let local = Arc::new(FixedBackend {
            tag: "local",
            result: || Err(GatewayError::NotFound("a".into())),
        });
        let chain = Arc::new(FixedBackend {
            tag: "chain",
            result: || Err(GatewayError::UpstreamUnavailable("b".into())),
        });
        let source = CompositeDataSource::new(vec![local, chain], vec![], 10, test_metrics());
        let err = source.get_data(&request(), false).await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn from_config_resolves_tags_and_skips_unknown_ones() {
        let local = Arc::new(FixedBackend {
            tag: "local",
            result: || Ok(()),
        }) as Arc<dyn DataSourceBackend>;
        let mut backends: HashMap<&'static str, Arc<dyn DataSourceBackend>> = HashMap::new();
        backends.insert("local", local);

        let config = gateway_config::GatewayConfig::default();
        let source = CompositeDataSource::from_config(&config, &backends, 10, test_metrics());
        let data = source.get_data(&request(), false).await.unwrap();
        assert_eq!(data.size, 2);
    }

    #[tokio::test]
    async fn hop_count_beyond_max_is_rejected_before_trying_any_backend() {
        let local = Arc::new(FixedBackend {
            tag: "local",
            result: || Ok(()),
        });
        let source = CompositeDataSource::new(vec![local], vec![], 2, test_metrics());
        let mut req = request();
        req.request_attrs = Some(crate::request::RequestAttributes {
            hop_count: 2,
            ..Default::default()
        });
        let err = source.get_data(&req, false).await.unwrap_err();
        assert!(matches!(err, GatewayError::OutOfRange(_)));
    }
}
