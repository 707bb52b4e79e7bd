//! The read-through cache itself (spec §4.1): `getData`/`getCacheData`,
//! caching eligibility, the tee pipeline, and verification-priority
//! derivation.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use gateway_config::GatewayConfig;
use gateway_data_source::{ByteStream, CompositeDataSource, ContiguousData, DataRequest, RequestAttributes};
use gateway_primitives::{
    now_ms, AttributesStore, ContentHash, DataAttributes, DataAttributesPatch, GatewayError, Region,
    VerificationPriority,
};
use gateway_telemetry::Metrics;

use crate::content_store::ContentStore;
use crate::metadata::MetadataStore;

/// Depth of the bounded channel feeding the caller's half of the tee. Small
/// enough that a slow caller applies real back-pressure to the upstream read.
const TEE_CHANNEL_DEPTH: usize = 4;

/// The upstream collaborator consulted on a cache miss (spec §6 "Upstream
/// data source"). Implemented for [`CompositeDataSource`] below so callers
/// wire the cache directly to the composite source without an adapter.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    async fn get_data(&self, req: &DataRequest, background: bool) -> Result<ContiguousData, GatewayError>;
}

#[async_trait]
impl UpstreamSource for CompositeDataSource {
    async fn get_data(&self, req: &DataRequest, background: bool) -> Result<ContiguousData, GatewayError> {
        CompositeDataSource::get_data(self, req, background).await
    }
}

pub struct ContentCache {
    attributes: Arc<dyn AttributesStore>,
    content_store: Arc<dyn ContentStore>,
    metadata: Arc<MetadataStore>,
    upstream: Arc<dyn UpstreamSource>,
    preferred_arns_names: HashSet<String>,
    preferred_arns_base_names: HashSet<String>,
    mru_arns_length: usize,
    skip_data_cache: bool,
    metrics: Arc<Metrics>,
}

impl ContentCache {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        attributes: Arc<dyn AttributesStore>,
        content_store: Arc<dyn ContentStore>,
        metadata: Arc<MetadataStore>,
        upstream: Arc<dyn UpstreamSource>,
        preferred_arns_names: &[String],
        preferred_arns_base_names: &[String],
        mru_arns_length: usize,
        skip_data_cache: bool,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            attributes,
            content_store,
            metadata,
            upstream,
            preferred_arns_names: preferred_arns_names.iter().cloned().collect(),
            preferred_arns_base_names: preferred_arns_base_names.iter().cloned().collect(),
            mru_arns_length,
            skip_data_cache,
            metrics,
        }
    }

    #[must_use]
    pub fn from_config(
        config: &GatewayConfig,
        attributes: Arc<dyn AttributesStore>,
        content_store: Arc<dyn ContentStore>,
        metadata: Arc<MetadataStore>,
        upstream: Arc<dyn UpstreamSource>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self::new(
            attributes,
            content_store,
            metadata,
            upstream,
            &config.preferred_arns_names,
            &config.preferred_arns_base_names,
            config.mru_arns_length,
            config.skip_data_cache,
            metrics,
        )
    }

    pub async fn get_data(
        &self,
        id: gateway_primitives::Identifier,
        attrs: Option<DataAttributes>,
        request_attrs: Option<RequestAttributes>,
        region: Option<Region>,
    ) -> Result<ContiguousData, GatewayError> {
        let result = self.get_data_inner(id, attrs, request_attrs, region).await;
        if let Err(err) = &result {
            gateway_telemetry::record_error(&self.metrics, err);
        }
        result
    }

    async fn get_data_inner(
        &self,
        id: gateway_primitives::Identifier,
        attrs: Option<DataAttributes>,
        request_attrs: Option<RequestAttributes>,
        region: Option<Region>,
    ) -> Result<ContiguousData, GatewayError> {
        let attrs = match attrs {
            Some(attrs) => attrs,
            None => self
                .attributes
                .get_data_attributes(&id)
                .await?
                .unwrap_or_default(),
        };

        if let Some(hash) = attrs.hash {
            let metadata = Arc::clone(&self.metadata);
            let arns_name = request_attrs.as_ref().and_then(|a| a.arns_name.clone());
            let arns_base_name = request_attrs.as_ref().and_then(|a| a.arns_base_name.clone());
            let mru_cap = self.mru_arns_length;
            tokio::spawn(async move {
                let now = now_ms();
                if let Err(err) = metadata.touch(hash, now, arns_name.as_deref(), arns_base_name.as_deref(), mru_cap) {
                    warn!(%hash, error = %err, "content cache: metadata touch failed");
                }
            });
        }

        if !self.skip_data_cache {
            if let Some((stream, size)) = self.get_cache_data(&id, attrs.hash, attrs.size, region).await? {
                return Ok(ContiguousData {
                    stream,
                    size,
                    source_content_type: attrs.content_type.clone(),
                    verified: attrs.verified,
                    trusted: true,
                    cached: true,
                    request_attrs,
                });
            }
        }

        let req = DataRequest {
            id,
            attrs: Some(attrs.clone()),
            request_attrs: request_attrs.clone(),
            region,
        };
        let upstream_data = self.upstream.get_data(&req, false).await?;

        let eligible = region.is_none() && (upstream_data.trusted || attrs.hash.is_some());
        if !eligible {
            return Ok(upstream_data);
        }

        Ok(self.tee_and_cache(id, attrs, upstream_data, request_attrs))
    }

    /// Walks parent links until a hash becomes known, then asks the content
    /// store for it (spec §4.1 `getCacheData`).
    async fn get_cache_data(
        &self,
        id: &gateway_primitives::Identifier,
        hash: Option<ContentHash>,
        size: Option<u64>,
        region: Option<Region>,
    ) -> Result<Option<(ByteStream, u64)>, GatewayError> {
        let mut current_id = *id;
        let mut current_hash = hash;
        let mut current_size = size;
        let mut current_region = region;

        loop {
            if let Some(hash) = current_hash {
                return self.content_store.get(hash, current_region).await;
            }

            match self.attributes.get_data_parent(&current_id).await? {
                Some(parent) => {
                    let base = current_region
                        .unwrap_or_else(|| Region::new(0, current_size.unwrap_or(parent.size)));
                    current_region = Some(base.shifted_by(parent.offset));
                    current_size = Some(parent.size);
                    current_hash = parent.parent_hash;
                    current_id = parent.parent_id;
                }
                None => return Ok(None),
            }
        }
    }

    /// Forks the upstream stream to the caller and, concurrently, to a
    /// content-store write (spec §9 "Streaming with a tee"). The bounded
    /// channel to the caller is the back-pressure point: the forwarding task
    /// only pulls the next upstream chunk once both the cache write and the
    /// previous send have completed.
    fn tee_and_cache(
        &self,
        id: gateway_primitives::Identifier,
        attrs: DataAttributes,
        upstream: ContiguousData,
        request_attrs: Option<RequestAttributes>,
    ) -> ContiguousData {
        let (tx, rx) = mpsc::channel::<Result<Bytes, GatewayError>>(TEE_CHANNEL_DEPTH);
        let content_store = Arc::clone(&self.content_store);
        let attributes = Arc::clone(&self.attributes);
        let size = upstream.size;
        let trusted = upstream.trusted;
        let source_content_type = upstream.source_content_type.clone();
        let verification_priority = self.verification_priority(&request_attrs);

        tokio::spawn(run_tee(
            id,
            attrs,
            upstream.stream,
            tx,
            content_store,
            attributes,
            size,
            trusted,
            source_content_type,
            verification_priority,
        ));

        ContiguousData {
            stream: Box::pin(ReceiverStream::new(rx)),
            size,
            source_content_type: upstream.source_content_type,
            verified: upstream.verified,
            trusted,
            cached: false,
            request_attrs,
        }
    }

    /// Derives verification priority from the request's ArNS attributes
    /// (spec §4.1 "Verification priority").
    fn verification_priority(&self, request_attrs: &Option<RequestAttributes>) -> Option<VerificationPriority> {
        let attrs = request_attrs.as_ref()?;
        let name = attrs.arns_name.as_deref();
        let base_name = attrs.arns_base_name.as_deref();

        let is_preferred = name.is_some_and(|n| self.preferred_arns_names.contains(n))
            || base_name.is_some_and(|n| self.preferred_arns_base_names.contains(n));
        if is_preferred {
            return Some(VerificationPriority::PreferredArns);
        }
        if name.is_some() || base_name.is_some() {
            return Some(VerificationPriority::Arns);
        }
        None
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_tee(
    id: gateway_primitives::Identifier,
    attrs: DataAttributes,
    mut upstream_stream: ByteStream,
    tx: mpsc::Sender<Result<Bytes, GatewayError>>,
    content_store: Arc<dyn ContentStore>,
    attributes: Arc<dyn AttributesStore>,
    declared_size: u64,
    trusted: bool,
    source_content_type: Option<String>,
    verification_priority: Option<VerificationPriority>,
) {
    let mut handle = match content_store.create_write_stream().await {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!(%id, error = %err, "content cache: failed to open write stream, caching skipped");
            None
        }
    };
    let mut hasher = Sha256::new();
    let mut observed: u64 = 0;

    while let Some(next) = upstream_stream.next().await {
        match next {
            Ok(chunk) => {
                observed += chunk.len() as u64;
                hasher.update(&chunk);
                if let Some(h) = handle.as_mut() {
                    if let Err(err) = content_store.write_chunk(h, &chunk).await {
                        warn!(%id, error = %err, "content cache: write failed, discarding cache entry");
                        handle = None;
                    }
                }
                if tx.send(Ok(chunk)).await.is_err() {
                    // Caller dropped the receiver; stop cache-writing too.
                    if let Some(h) = handle.take() {
                        let _ = content_store.cleanup(h).await;
                    }
                    return;
                }
            }
            Err(err) => {
                if let Some(h) = handle.take() {
                    let _ = content_store.cleanup(h).await;
                }
                let _ = tx.send(Err(err)).await;
                return;
            }
        }
    }

    let Some(handle) = handle else { return };

    if observed != declared_size {
        warn!(%id, observed, declared_size, "content cache: size mismatch at end of stream, discarding");
        let _ = content_store.cleanup(handle).await;
        return;
    }

    let computed_hash = ContentHash::from_bytes(hasher.finalize().into());
    let hash_matches = match attrs.hash {
        Some(expected) => expected == computed_hash,
        None => true,
    };

    if trusted || hash_matches {
        if let Err(err) = content_store.finalize(handle, computed_hash).await {
            warn!(%id, error = %err, "content cache: finalize failed");
            return;
        }
        let patch = DataAttributesPatch {
            data_root: attrs.data_root,
            hash: Some(computed_hash),
            size: Some(declared_size),
            content_type: source_content_type,
            cached_at_ms: Some(now_ms()),
            verified: Some(attrs.verified),
            verification_priority,
            root_transaction_id: None,
            root_data_item_offset: None,
            root_data_offset: None,
        };
        if let Err(err) = attributes.set_data_attributes(&id, patch).await {
            warn!(%id, error = %err, "content cache: attributes update failed");
        }
    } else {
        warn!(%id, "content cache: untrusted bytes with mismatching hash, discarding");
        let _ = content_store.cleanup(handle).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use camino::Utf8Path;
    use futures::stream;

    use gateway_primitives::{DataParent, Identifier, RootTxLookup};

    use crate::content_store::FsContentStore;

    use super::*;

    struct MockAttributes {
        attrs: Mutex<HashMap<Identifier, DataAttributes>>,
        parents: Mutex<HashMap<Identifier, DataParent>>,
    }

    impl MockAttributes {
        fn new() -> Self {
            Self {
                attrs: Mutex::new(HashMap::new()),
                parents: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl AttributesStore for MockAttributes {
        async fn get_data_attributes(&self, id: &Identifier) -> Result<Option<DataAttributes>, GatewayError> {
            Ok(self.attrs.lock().unwrap().get(id).cloned())
        }

        async fn get_data_parent(&self, id: &Identifier) -> Result<Option<DataParent>, GatewayError> {
            Ok(self.parents.lock().unwrap().get(id).cloned())
        }

        async fn set_data_attributes(&self, _id: &Identifier, _patch: DataAttributesPatch) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn get_root_tx(&self, _id: &Identifier) -> Result<Option<RootTxLookup>, GatewayError> {
            Ok(None)
        }
    }

    struct MockUpstream {
        bytes: Vec<u8>,
        trusted: bool,
    }

    #[async_trait]
    impl UpstreamSource for MockUpstream {
        async fn get_data(&self, req: &DataRequest, _background: bool) -> Result<ContiguousData, GatewayError> {
            let bytes = self.bytes.clone();
            let size = bytes.len() as u64;
            let stream = stream::once(async move { Ok(Bytes::from(bytes)) });
            Ok(ContiguousData {
                stream: Box::pin(stream),
                size,
                source_content_type: None,
                verified: false,
                trusted: self.trusted,
                cached: false,
                request_attrs: req.request_attrs.clone(),
            })
        }
    }

    async fn drain(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    async fn fs_store() -> Arc<FsContentStore> {
        let dir = tempfile::tempdir().unwrap();
        Arc::new(
            FsContentStore::open(Utf8Path::from_path(dir.path()).unwrap().to_owned())
                .await
                .unwrap(),
        )
    }

    fn metadata_store() -> Arc<MetadataStore> {
        Arc::new(MetadataStore::new(Arc::new(gateway_store::InMemoryDB::new())))
    }

    fn test_metrics() -> Arc<Metrics> {
        Arc::new(Metrics::standalone())
    }

    #[tokio::test]
    async fn from_config_wires_up_skip_data_cache() {
        let content_store = fs_store().await;
        let attrs = MockAttributes::new();
        let id = Identifier::from_bytes([9; 32]);
        let hash = ContentHash::of(b"irrelevant, never reached");
        attrs.attrs.lock().unwrap().insert(
            id,
            DataAttributes {
                size: Some(4),
                hash: Some(hash),
                ..Default::default()
            },
        );

        let mut config = gateway_config::GatewayConfig::default();
        config.skip_data_cache = true;
        let upstream = MockUpstream { bytes: vec![1, 2, 3, 4], trusted: true };

        let cache = ContentCache::from_config(
            &config,
            Arc::new(attrs),
            content_store,
            metadata_store(),
            Arc::new(upstream),
            test_metrics(),
        );

        // skip_data_cache bypasses the cache read even though the hash is
        // known, so this must go straight to upstream.
        let result = cache.get_data(id, None, None, None).await.unwrap();
        assert!(!result.cached);
    }

    #[tokio::test]
    async fn scenario_s1_plain_hit() {
        let content_store = fs_store().await;
        let data = vec![0u8; 1024];
        let hash = ContentHash::of(&data);

        let mut handle = content_store.create_write_stream().await.unwrap();
        content_store.write_chunk(&mut handle, &Bytes::from(data.clone())).await.unwrap();
        content_store.finalize(handle, hash).await.unwrap();

        let attrs = MockAttributes::new();
        let id = Identifier::from_bytes([1; 32]);
        attrs.attrs.lock().unwrap().insert(
            id,
            DataAttributes {
                size: Some(1024),
                hash: Some(hash),
                ..Default::default()
            },
        );

        let upstream = MockUpstream { bytes: Vec::new(), trusted: false };
        let cache = ContentCache::new(
            Arc::new(attrs),
            content_store,
            metadata_store(),
            Arc::new(upstream),
            &[],
            &[],
            10,
            false,
            test_metrics(),
        );

        let result = cache.get_data(id, None, None, None).await.unwrap();
        assert!(result.cached);
        assert!(result.trusted);
        assert!(!result.verified);
        assert_eq!(result.size, 1024);
        assert_eq!(drain(result.stream).await, data);
    }

    #[tokio::test]
    async fn scenario_s2_miss_then_fill() {
        let content_store = fs_store().await;
        let attrs = MockAttributes::new();
        let id = Identifier::from_bytes([2; 32]);
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let upstream = MockUpstream { bytes: data.clone(), trusted: true };

        let cache = ContentCache::new(
            Arc::new(attrs),
            Arc::clone(&content_store),
            metadata_store(),
            Arc::new(upstream),
            &[],
            &[],
            10,
            false,
            test_metrics(),
        );

        let first = cache.get_data(id, None, None, None).await.unwrap();
        assert!(!first.cached);
        let first_bytes = drain(first.stream).await;
        assert_eq!(first_bytes, data);

        let expected_hash = ContentHash::of(&data);
        let (stream, size) = content_store.get(expected_hash, None).await.unwrap().unwrap();
        assert_eq!(size, 4096);
        assert_eq!(drain(stream).await, data);
    }

    #[tokio::test]
    async fn scenario_s3_hash_mismatch_rejection() {
        let content_store = fs_store().await;
        let attrs = MockAttributes::new();
        let id = Identifier::from_bytes([3; 32]);
        let expected_hash = ContentHash::of(b"this is not the data that arrives");
        attrs.attrs.lock().unwrap().insert(
            id,
            DataAttributes {
                size: Some(1024),
                hash: Some(expected_hash),
                ..Default::default()
            },
        );

        let mismatched = vec![7u8; 1024];
        let upstream = MockUpstream { bytes: mismatched.clone(), trusted: false };
        let cache = ContentCache::new(
            Arc::new(attrs),
            Arc::clone(&content_store),
            metadata_store(),
            Arc::new(upstream),
            &[],
            &[],
            10,
            false,
            test_metrics(),
        );

        let first = cache.get_data(id, None, None, None).await.unwrap();
        assert!(!first.cached);
        assert_eq!(drain(first.stream).await, mismatched);

        assert!(content_store.get(expected_hash, None).await.unwrap().is_none());

        let second = cache.get_data(id, None, None, None).await.unwrap();
        assert!(!second.cached, "a rejected write must not poison the cache");
    }
}
