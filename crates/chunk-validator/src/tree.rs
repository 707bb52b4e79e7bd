//! Reference Merkle tree builder used only by this crate's own tests, to
//! construct `tx_path` fixtures without depending on a live chain client.

use sha2::{Digest, Sha256};

use gateway_primitives::WeaveOffset;

pub struct LeafSpec {
    pub data_root: [u8; 32],
    pub tx_end_offset: WeaveOffset,
}

pub enum Node {
    Leaf {
        data_root: [u8; 32],
        tx_end_offset: WeaveOffset,
        hash: [u8; 32],
    },
    Branch {
        left: Box<Node>,
        right: Box<Node>,
        boundary: WeaveOffset,
        hash: [u8; 32],
        max_offset: WeaveOffset,
    },
}

impl Node {
    fn hash(&self) -> [u8; 32] {
        match self {
            Node::Leaf { hash, .. } | Node::Branch { hash, .. } => *hash,
        }
    }

    fn max_offset(&self) -> WeaveOffset {
        match self {
            Node::Leaf { tx_end_offset, .. } => tx_end_offset.clone(),
            Node::Branch { max_offset, .. } => max_offset.clone(),
        }
    }

    fn leaf_count(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Branch { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

fn leaf_hash(data_root: &[u8; 32], tx_end_offset: &WeaveOffset) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(sha256(data_root));
    hasher.update(sha256(&tx_end_offset.to_be_bytes_32()));
    hasher.finalize().into()
}

fn branch_hash(left: [u8; 32], right: [u8; 32], boundary: &WeaveOffset) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(sha256(&left));
    hasher.update(sha256(&right));
    hasher.update(sha256(&boundary.to_be_bytes_32()));
    hasher.finalize().into()
}

fn build_node(leaves: &[LeafSpec]) -> Node {
    if leaves.len() == 1 {
        let hash = leaf_hash(&leaves[0].data_root, &leaves[0].tx_end_offset);
        return Node::Leaf {
            data_root: leaves[0].data_root,
            tx_end_offset: leaves[0].tx_end_offset.clone(),
            hash,
        };
    }
    let split = leaves.len() / 2;
    let left = build_node(&leaves[..split]);
    let right = build_node(&leaves[split..]);
    let boundary = left.max_offset();
    let hash = branch_hash(left.hash(), right.hash(), &boundary);
    let max_offset = right.max_offset();
    Node::Branch {
        left: Box::new(left),
        right: Box::new(right),
        boundary,
        hash,
        max_offset,
    }
}

/// Builds a balanced Merkle tree over `leaves` (ordered by ascending
/// `tx_end_offset`) and returns its root hash alongside the tree itself.
pub fn build(leaves: &[LeafSpec]) -> ([u8; 32], Node) {
    let root = build_node(leaves);
    (root.hash(), root)
}

/// Encodes the `tx_path` that proves `leaf_index`, in the branch-then-leaf
/// wire format `validate_tx_path` expects.
pub fn encode_path(node: &Node, leaf_index: usize) -> Vec<u8> {
    match node {
        Node::Leaf {
            data_root,
            tx_end_offset,
            ..
        } => {
            let mut out = Vec::with_capacity(64);
            out.extend_from_slice(data_root);
            out.extend_from_slice(&tx_end_offset.to_be_bytes_32());
            out
        }
        Node::Branch {
            left,
            right,
            boundary,
            ..
        } => {
            let left_count = left.leaf_count();
            let mut out = Vec::with_capacity(96);
            out.extend_from_slice(&left.hash());
            out.extend_from_slice(&right.hash());
            out.extend_from_slice(&boundary.to_be_bytes_32());
            if leaf_index < left_count {
                out.extend(encode_path(left, leaf_index));
            } else {
                out.extend(encode_path(right, leaf_index - left_count));
            }
            out
        }
    }
}
