//! Generic `Database`/`Column`/`Slice` KV abstraction. Backs the core's
//! metadata store and the rate limiter's in-memory bucket backend; a
//! RocksDB-backed implementation lives in `gateway-store-rocksdb`.

pub mod db;
pub mod memory;
pub mod slice;

pub use db::{Column, Database, StoreError};
pub use memory::InMemoryDB;
pub use slice::Slice;
