//! Merkle `tx_path` validation (spec §4.4): proves a byte offset is covered
//! by a transaction claimed to sit under a given block's `tx_root`.

pub mod path;

#[cfg(test)]
mod tree;

pub use path::{validate_tx_path, ValidatedTxPath};
