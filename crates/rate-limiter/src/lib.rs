//! Per-resource and per-IP token-bucket admission control, with speculative
//! consumption and post-hoc reconciliation against actual response size
//! (spec §4.5).

pub mod backend;
pub mod key;
pub mod limiter;
pub mod memory;
pub mod store;

pub use backend::{tokens_for_bytes, BucketBackend, BucketParams, ConsumeOutcome};
pub use limiter::{BucketKind, LimitOutcome, LimitRequest, RateLimiter};
pub use memory::InMemoryBucketBackend;
pub use store::StoreBucketBackend;
