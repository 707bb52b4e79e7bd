//! Root-parent resolver (spec §4.3): turns a possibly deeply nested
//! data-item id into `(rootTxId, rootDataOffset, size)` so the cache can
//! serve a byte range of one cached root blob instead of fetching the
//! nested item directly.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use gateway_config::GatewayConfig;
use gateway_primitives::{
    AttributesStore, BundleOffsetSource, DataAttributesPatch, GatewayError, Identifier, Region,
};
use gateway_telemetry::Metrics;

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedRoot {
    pub root_tx_id: Identifier,
    pub root_data_item_offset: u64,
    pub root_data_offset: u64,
    pub size: u64,
    /// Preserves the data item's own content type, not the root tx's
    /// (spec §4.3 "The resolver preserves the original content type").
    pub content_type: Option<String>,
}

pub struct Resolver {
    attributes: Arc<dyn AttributesStore>,
    bundle_offset_source: Option<Arc<dyn BundleOffsetSource>>,
    max_bundle_nesting_depth: u32,
    enable_legacy_root_tx_fallback: bool,
    metrics: Arc<Metrics>,
}

impl Resolver {
    #[must_use]
    pub fn new(
        attributes: Arc<dyn AttributesStore>,
        bundle_offset_source: Option<Arc<dyn BundleOffsetSource>>,
        max_bundle_nesting_depth: u32,
        enable_legacy_root_tx_fallback: bool,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            attributes,
            bundle_offset_source,
            max_bundle_nesting_depth,
            enable_legacy_root_tx_fallback,
            metrics,
        }
    }

    #[must_use]
    pub fn from_config(
        config: &GatewayConfig,
        attributes: Arc<dyn AttributesStore>,
        bundle_offset_source: Option<Arc<dyn BundleOffsetSource>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self::new(
            attributes,
            bundle_offset_source,
            config.max_bundle_nesting_depth,
            config.enable_legacy_root_tx_fallback,
            metrics,
        )
    }

    /// `None` means "pass through": `id` is already an L1 transaction, or no
    /// collaborator could resolve it and legacy fallback is disabled.
    pub async fn resolve(&self, id: &Identifier) -> Result<Option<ResolvedRoot>, GatewayError> {
        let result = self.resolve_inner(id).await;
        if let Err(err) = &result {
            gateway_telemetry::record_error(&self.metrics, err);
        }
        result
    }

    async fn resolve_inner(&self, id: &Identifier) -> Result<Option<ResolvedRoot>, GatewayError> {
        let Some(target_attrs) = self.attributes.get_data_attributes(id).await? else {
            return if self.enable_legacy_root_tx_fallback {
                self.legacy_fallback(id).await
            } else {
                Ok(None)
            };
        };

        if target_attrs.has_root_fast_path() {
            return Ok(Some(ResolvedRoot {
                root_tx_id: target_attrs.root_transaction_id.expect("checked by has_root_fast_path"),
                root_data_item_offset: target_attrs
                    .root_data_item_offset
                    .expect("checked by has_root_fast_path"),
                root_data_offset: target_attrs.root_data_offset.expect("checked by has_root_fast_path"),
                size: target_attrs.size.expect("checked by has_root_fast_path"),
                content_type: target_attrs.content_type.clone(),
            }));
        }

        let Some(size) = target_attrs.size else {
            return Err(GatewayError::Internal(format!(
                "attributes for {id} have no size; resolver cannot proceed"
            )));
        };
        let initial_data_offset = target_attrs.data_offset.unwrap_or(0);

        let mut visited = HashSet::new();
        visited.insert(*id);
        let mut current_id = *id;
        let mut current_attrs = target_attrs.clone();
        let mut total_offset: u64 = 0;
        let mut moved = false;

        loop {
            let Some(parent_id) = current_attrs.parent_id else {
                break;
            };
            if parent_id == current_id {
                break;
            }

            total_offset = total_offset
                .saturating_add(current_attrs.offset.unwrap_or(0))
                .saturating_add(current_attrs.data_offset.unwrap_or(0));
            moved = true;
            current_id = parent_id;

            if !visited.insert(current_id) {
                return Err(GatewayError::ValidationFailed(format!(
                    "cycle detected walking parent chain of {id}"
                )));
            }
            if visited.len() as u32 > self.max_bundle_nesting_depth {
                return Err(GatewayError::OutOfRange(format!(
                    "parent chain of {id} exceeds max_bundle_nesting_depth={}",
                    self.max_bundle_nesting_depth
                )));
            }

            let Some(next_attrs) = self.attributes.get_data_attributes(&current_id).await? else {
                return Err(GatewayError::NotFound(format!(
                    "no attributes for parent {current_id} while resolving {id}"
                )));
            };
            current_attrs = next_attrs;
        }

        if !moved {
            debug!(%id, "resolver: id never left the target, treating as an L1 transaction");
            return Ok(None);
        }

        let resolved = ResolvedRoot {
            root_tx_id: current_id,
            root_data_item_offset: total_offset,
            root_data_offset: total_offset + initial_data_offset,
            size,
            content_type: target_attrs.content_type.clone(),
        };
        self.persist(id, &resolved).await;
        Ok(Some(resolved))
    }

    async fn legacy_fallback(&self, id: &Identifier) -> Result<Option<ResolvedRoot>, GatewayError> {
        let Some(lookup) = self.attributes.get_root_tx(id).await? else {
            return Ok(None);
        };

        if let (Some(root_data_offset), Some(size)) = (lookup.root_data_offset, lookup.size) {
            let resolved = ResolvedRoot {
                root_tx_id: lookup.root_tx_id,
                root_data_item_offset: lookup.root_offset.unwrap_or(root_data_offset),
                root_data_offset,
                size,
                content_type: lookup.content_type.clone(),
            };
            self.persist(id, &resolved).await;
            return Ok(Some(resolved));
        }

        let Some(bundle_offset_source) = &self.bundle_offset_source else {
            return Ok(None);
        };
        let Some(offset) = bundle_offset_source
            .get_data_item_offset(id, &lookup.root_tx_id)
            .await?
        else {
            return Ok(None);
        };

        let resolved = ResolvedRoot {
            root_tx_id: lookup.root_tx_id,
            root_data_item_offset: offset.item_offset,
            root_data_offset: offset.item_offset + offset.data_offset,
            size: offset.data_size,
            content_type: offset.content_type.clone().or_else(|| lookup.content_type.clone()),
        };
        self.persist(id, &resolved).await;
        Ok(Some(resolved))
    }

    async fn persist(&self, id: &Identifier, resolved: &ResolvedRoot) {
        let patch = DataAttributesPatch {
            root_transaction_id: Some(resolved.root_tx_id),
            root_data_item_offset: Some(resolved.root_data_item_offset),
            root_data_offset: Some(resolved.root_data_offset),
            size: Some(resolved.size),
            ..Default::default()
        };
        if let Err(err) = self.attributes.set_data_attributes(id, patch).await {
            warn!(%id, error = %err, "failed to persist resolved root offsets");
        }
    }
}

/// Adjusts a caller-supplied region to be relative to the root transaction's
/// data payload (spec §4.3 "Region arithmetic"). No region means "the whole
/// item".
pub fn resolve_region(resolved: &ResolvedRoot, region: Option<Region>) -> Result<Region, GatewayError> {
    match region {
        None => Ok(Region::new(resolved.root_data_offset, resolved.size)),
        Some(region) => {
            if region.offset >= resolved.size {
                return Err(GatewayError::OutOfRange(format!(
                    "region offset {} is beyond data size {}",
                    region.offset, resolved.size
                )));
            }
            Ok(Region::new(
                resolved.root_data_offset + region.offset,
                region.size.min(resolved.size - region.offset),
            ))
        }
    }
}
