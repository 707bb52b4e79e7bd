//! Recognized configuration options (spec §6). This crate only defines and
//! validates the shape; loading it from TOML/env/files is an external
//! collaborator's job (CLI, bootstrap), named out of scope by spec §1.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

/// Default weight applied to a trusted gateway with no explicit weight.
pub const DEFAULT_GATEWAY_WEIGHT: u32 = 1;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[non_exhaustive]
pub struct GatewayConfig {
    #[serde(default = "default_on_demand_retrieval_order")]
    pub on_demand_retrieval_order: Vec<String>,

    #[serde(default = "default_background_retrieval_order")]
    pub background_retrieval_order: Vec<String>,

    #[serde(default)]
    pub skip_data_cache: bool,

    #[serde(default)]
    pub preferred_arns_names: Vec<String>,

    #[serde(default)]
    pub preferred_arns_base_names: Vec<String>,

    #[serde(default = "default_max_bundle_nesting_depth")]
    pub max_bundle_nesting_depth: u32,

    #[serde(default = "default_mru_arns_length")]
    pub mru_arns_length: usize,

    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub trusted_gateways: Vec<TrustedGatewayConfig>,

    #[serde(default = "default_trusted_gateway_timeout_ms")]
    pub trusted_gateways_request_timeout_ms: u64,

    #[serde(default)]
    pub enable_legacy_root_tx_fallback: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            on_demand_retrieval_order: default_on_demand_retrieval_order(),
            background_retrieval_order: default_background_retrieval_order(),
            skip_data_cache: false,
            preferred_arns_names: Vec::new(),
            preferred_arns_base_names: Vec::new(),
            max_bundle_nesting_depth: default_max_bundle_nesting_depth(),
            mru_arns_length: default_mru_arns_length(),
            rate_limit: RateLimitConfig::default(),
            trusted_gateways: Vec::new(),
            trusted_gateways_request_timeout_ms: default_trusted_gateway_timeout_ms(),
            enable_legacy_root_tx_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[non_exhaustive]
pub struct RateLimitConfig {
    #[serde(default = "default_resource_capacity")]
    pub resource_capacity: f64,
    #[serde(default = "default_resource_refill_rate")]
    pub resource_refill_rate: f64,
    #[serde(default = "default_ip_capacity")]
    pub ip_capacity: f64,
    #[serde(default = "default_ip_refill_rate")]
    pub ip_refill_rate: f64,
    #[serde(default = "default_capacity_multiplier")]
    pub capacity_multiplier: f64,
    #[serde(default)]
    pub ip_allowlist: Vec<IpNetwork>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            resource_capacity: default_resource_capacity(),
            resource_refill_rate: default_resource_refill_rate(),
            ip_capacity: default_ip_capacity(),
            ip_refill_rate: default_ip_refill_rate(),
            capacity_multiplier: default_capacity_multiplier(),
            ip_allowlist: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn allows(&self, ip: IpAddr) -> bool {
        self.ip_allowlist.iter().any(|cidr| cidr.contains(ip))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[non_exhaustive]
pub struct TrustedGatewayConfig {
    pub url: String,
    #[serde(default = "default_gateway_weight")]
    pub weight: u32,
}

const fn default_gateway_weight() -> u32 {
    DEFAULT_GATEWAY_WEIGHT
}

fn default_on_demand_retrieval_order() -> Vec<String> {
    vec![
        "local".to_owned(),
        "trusted-gateway".to_owned(),
        "peer-chunk".to_owned(),
        "chain".to_owned(),
    ]
}

fn default_background_retrieval_order() -> Vec<String> {
    vec![
        "local".to_owned(),
        "chain".to_owned(),
        "trusted-gateway".to_owned(),
        "peer-chunk".to_owned(),
    ]
}

const fn default_max_bundle_nesting_depth() -> u32 {
    10
}

const fn default_mru_arns_length() -> usize {
    10
}

const fn default_resource_capacity() -> f64 {
    100.0
}

const fn default_resource_refill_rate() -> f64 {
    10.0
}

const fn default_ip_capacity() -> f64 {
    50.0
}

const fn default_ip_refill_rate() -> f64 {
    5.0
}

const fn default_capacity_multiplier() -> f64 {
    1.0
}

const fn default_trusted_gateway_timeout_ms() -> u64 {
    10_000
}
