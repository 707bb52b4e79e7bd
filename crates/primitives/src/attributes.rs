//! Data model types shared across the core (spec §3).

use serde::{Deserialize, Serialize};

use crate::id::{ContentHash, Identifier};
use crate::weave::WeaveOffset;

/// A byte region relative to whatever id/hash it is paired with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub offset: u64,
    pub size: u64,
}

impl Region {
    #[must_use]
    pub const fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Shifts this region by `delta`, used when recursing through a parent
    /// link in [`crate::attributes`]'s `getCacheData` helper (spec §4.1).
    #[must_use]
    pub fn shifted_by(&self, delta: u64) -> Self {
        Self {
            offset: self.offset + delta,
            size: self.size,
        }
    }
}

/// For a given logical id. Any field may be absent; the resolver's job is to
/// fill in the root-relative offsets (spec §3).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataAttributes {
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub hash: Option<ContentHash>,
    pub data_root: Option<[u8; 32]>,
    pub parent_id: Option<Identifier>,
    pub root_transaction_id: Option<Identifier>,
    pub offset: Option<u64>,
    pub data_offset: Option<u64>,
    pub root_data_item_offset: Option<u64>,
    pub root_data_offset: Option<u64>,
    pub verified: bool,
    pub stable: bool,
}

impl DataAttributes {
    /// True iff the pre-computed root-resolution fast path (spec §4.3 step 1)
    /// has everything it needs.
    #[must_use]
    pub fn has_root_fast_path(&self) -> bool {
        self.root_transaction_id.is_some()
            && self.root_data_item_offset.is_some()
            && self.root_data_offset.is_some()
            && self.size.is_some()
    }
}

/// `getDataParent` result: the immediate parent link used by the cache's
/// recursive `getCacheData` helper (spec §4.1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataParent {
    pub parent_id: Identifier,
    pub parent_hash: Option<ContentHash>,
    pub offset: u64,
    pub size: u64,
}

/// `getRootTx` result from the legacy fallback collaborator (spec §4.3 step 3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RootTxLookup {
    pub root_tx_id: Identifier,
    pub root_offset: Option<u64>,
    pub root_data_offset: Option<u64>,
    pub size: Option<u64>,
    pub data_size: Option<u64>,
    pub content_type: Option<String>,
}

/// Keyed by content hash. Created on first successful cache lookup, mutated
/// on every subsequent access, never deleted by the core (spec §3).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub access_timestamp_ms: u64,
    /// Most-recent-first, deduplicated, bounded by `mruArNSLength` (default 10).
    pub mru_arns_names: Vec<String>,
    pub mru_arns_base_names: Vec<String>,
}

impl MetadataRecord {
    /// Pushes `name` to the front of `list`, deduplicating and truncating to
    /// `cap` entries (spec §4.1 "Metadata cache update").
    pub fn push_mru(list: &mut Vec<String>, name: String, cap: usize) {
        list.retain(|existing| existing != &name);
        list.insert(0, name);
        list.truncate(cap);
    }
}

/// Consumed, not owned: `weave_size` is cumulative and may exceed `2^53`
/// (spec §3).
#[derive(Clone, Debug, PartialEq)]
pub struct BlockHeader {
    pub height: u64,
    pub tx_root: [u8; 32],
    pub weave_size: WeaveOffset,
    pub prev_weave_size: WeaveOffset,
}

/// Derived from request attributes (spec §4.1 "Verification priority").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationPriority {
    PreferredArns,
    Arns,
}
