//! The validation algorithm itself (spec §4.4).
//!
//! A `tx_path` is a left-to-right list of Merkle branch nodes (96 bytes:
//! left hash, right hash, big-endian boundary) followed by exactly one leaf
//! node (64 bytes: data_root, big-endian tx_end_offset). Every hash in the
//! path is re-derived from its own children and checked against the hash
//! the caller declared as `tx_root`; a single mismatch anywhere fails the
//! whole proof.

use sha2::{Digest, Sha256};

use gateway_primitives::{BlockHeader, GatewayError, WeaveOffset};

const BRANCH_NODE_LEN: usize = 96;
const LEAF_NODE_LEN: usize = 64;
const HASH_LEN: usize = 32;

/// What a successfully validated `tx_path` proves about its target offset.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedTxPath {
    pub data_root: [u8; 32],
    pub tx_start_offset: WeaveOffset,
    pub tx_end_offset: WeaveOffset,
    pub tx_size: WeaveOffset,
}

/// Proves that `target_offset` falls inside the transaction described by the
/// leaf of `tx_path`, and that the whole path hashes up to `tx_root` under
/// `block`. Offsets inside the path are block-relative; the result is
/// converted back to absolute weave offsets using `block.prev_weave_size`.
pub fn validate_tx_path(
    tx_path: &[u8],
    tx_root: [u8; 32],
    target_offset: &WeaveOffset,
    block: &BlockHeader,
) -> Result<ValidatedTxPath, GatewayError> {
    if tx_path.len() < LEAF_NODE_LEN {
        return Err(GatewayError::ValidationFailed(
            "tx_path shorter than one leaf node".to_owned(),
        ));
    }
    let branch_bytes = tx_path.len() - LEAF_NODE_LEN;
    if branch_bytes % BRANCH_NODE_LEN != 0 {
        return Err(GatewayError::ValidationFailed(
            "tx_path length is not leaf + n*branch".to_owned(),
        ));
    }

    if *target_offset < block.prev_weave_size {
        return Err(GatewayError::OutOfRange(
            "target offset precedes the block's weave range".to_owned(),
        ));
    }
    let relative_target = target_offset.clone() - block.prev_weave_size.clone();

    let mut expected_hash = tx_root;
    let mut lower = WeaveOffset::zero();
    let mut upper = block.weave_size.clone() - block.prev_weave_size.clone();

    let branch_count = branch_bytes / BRANCH_NODE_LEN;
    let mut cursor = 0usize;
    for _ in 0..branch_count {
        let node = &tx_path[cursor..cursor + BRANCH_NODE_LEN];
        let left: [u8; HASH_LEN] = node[0..32].try_into().expect("32 bytes");
        let right: [u8; HASH_LEN] = node[32..64].try_into().expect("32 bytes");
        let boundary_bytes = &node[64..96];

        if branch_node_hash(&left, &right, boundary_bytes) != expected_hash {
            return Err(GatewayError::ValidationFailed(
                "branch node hash does not match expected parent hash".to_owned(),
            ));
        }

        let boundary = WeaveOffset::from_bytes_be(boundary_bytes);
        if relative_target < boundary {
            expected_hash = left;
            upper = boundary;
        } else {
            expected_hash = right;
            lower = boundary;
        }
        cursor += BRANCH_NODE_LEN;
    }

    let leaf = &tx_path[cursor..cursor + LEAF_NODE_LEN];
    let data_root: [u8; 32] = leaf[0..32].try_into().expect("32 bytes");
    let tx_end_offset_bytes = &leaf[32..64];
    if leaf_node_hash(&data_root, tx_end_offset_bytes) != expected_hash {
        return Err(GatewayError::ValidationFailed(
            "leaf node hash does not match expected parent hash".to_owned(),
        ));
    }
    let tx_end_offset_relative = WeaveOffset::from_bytes_be(tx_end_offset_bytes);

    if !(lower < relative_target
        && relative_target <= tx_end_offset_relative
        && tx_end_offset_relative <= upper)
    {
        return Err(GatewayError::ValidationFailed(
            "leaf offset falls outside the range proven by its branch nodes".to_owned(),
        ));
    }

    let tx_start_offset = block.prev_weave_size.clone() + lower.clone();
    let tx_end_offset = block.prev_weave_size.clone() + tx_end_offset_relative.clone();
    let tx_size = tx_end_offset_relative - lower;

    Ok(ValidatedTxPath {
        data_root,
        tx_start_offset,
        tx_end_offset,
        tx_size,
    })
}

fn branch_node_hash(left: &[u8; 32], right: &[u8; 32], boundary_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(sha256(left));
    hasher.update(sha256(right));
    hasher.update(sha256(boundary_bytes));
    hasher.finalize().into()
}

fn leaf_node_hash(data_root: &[u8; 32], tx_end_offset_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(sha256(data_root));
    hasher.update(sha256(tx_end_offset_bytes));
    hasher.finalize().into()
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}
