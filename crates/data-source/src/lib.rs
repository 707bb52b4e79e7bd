//! Composite data source (spec §4.2): an ordered, configurable fallback
//! chain across backends, with temperature-weighted random selection inside
//! the trusted-gateway backend.

pub mod backend;
pub mod composite;
pub mod request;
pub mod trusted_gateway;

pub use backend::{DataSourceBackend, LocalStore, LocalStoreBackend, PeerChunkBackend};
pub use composite::CompositeDataSource;
pub use request::{ByteStream, ContiguousData, DataRequest, RequestAttributes};
pub use trusted_gateway::{
    TrustedGatewayBackend, TrustedGatewaySelector, WeightedGateway, DEFAULT_RECOMPUTE_INTERVAL_MS,
    DEFAULT_ROLLING_WINDOW,
};
