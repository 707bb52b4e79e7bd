//! The request/response shapes passed down the backend chain (spec §4.2,
//! provided interface `DataSource.getData` in §6).

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

use gateway_primitives::{DataAttributes, GatewayError, Identifier, Region};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, GatewayError>> + Send>>;

/// ArNS hints and the hop-count/trace header a proxying backend must
/// forward and bound (spec §4.2).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestAttributes {
    pub arns_name: Option<String>,
    pub arns_base_name: Option<String>,
    pub hop_count: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataRequest {
    pub id: Identifier,
    pub attrs: Option<DataAttributes>,
    pub request_attrs: Option<RequestAttributes>,
    pub region: Option<Region>,
}

pub struct ContiguousData {
    pub stream: ByteStream,
    pub size: u64,
    pub source_content_type: Option<String>,
    pub verified: bool,
    pub trusted: bool,
    pub cached: bool,
    pub request_attrs: Option<RequestAttributes>,
}
