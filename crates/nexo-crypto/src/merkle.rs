//! # Merkle Engine
//!
//! A binary hash tree over the ordered sequence of leaf hashes. The tree is
//! ephemeral: it is rebuilt from the full leaf sequence whenever a root or
//! proof is needed, then discarded.
//!
//! ## Algorithm
//!
//! - Each level is processed left to right in pairs; the parent of
//!   `(left, right)` is `SHA256(left || right)`.
//! - An odd trailing element is carried up to the next level unchanged (no
//!   duplication, no padding).
//! - The root of the empty tree is 32 zero bytes.
//!
//! There is no domain separation between leaf and node hashing. A leaf whose
//! value equals some `SHA256(a || b)` is indistinguishable from an interior
//! node. This is part of the existing wire contract and is kept as is.
//!
//! ## Inclusion Proofs
//!
//! The verifier walks the sibling list and uses the parity of a running index
//! to decide ordering (even: current is the left operand), halving the index
//! after every step. A carried node has no sibling at that level, so the
//! generator emits no step and no index bit for it. [`InclusionProof`]
//! therefore carries a `path_index` alongside the `leaf_index`; they differ
//! only when a carry touches the leaf's path.

use nexo_core::{sha256_concat, Digest32};
use serde::{Deserialize, Serialize};

use crate::error::MerkleError;

/// Parent hash: `SHA256(left || right)`.
pub fn hash_children(left: &Digest32, right: &Digest32) -> Digest32 {
    sha256_concat(&[left.as_bytes(), right.as_bytes()])
}

/// Reduce one level to the next: pair left to right, carry the odd tail.
fn next_level(level: &[Digest32]) -> Vec<Digest32> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_children(left, right),
            [carried] => *carried,
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

/// Compute the Merkle root of an ordered leaf-hash sequence.
///
/// `compute_root(&[])` is [`Digest32::ZERO`].
pub fn compute_root(leaves: &[Digest32]) -> Digest32 {
    if leaves.is_empty() {
        return Digest32::ZERO;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Verify an inclusion proof.
///
/// Starting from `leaf_hash`, combine with each sibling in order. If `index`
/// is even the current value is the left operand, otherwise the right. The
/// index is halved after each step. Returns `true` iff the final value
/// equals `expected_root` byte for byte.
pub fn verify_inclusion_proof(
    leaf_hash: &Digest32,
    proof: &[Digest32],
    index: u64,
    expected_root: &Digest32,
) -> bool {
    let mut current = *leaf_hash;
    let mut idx = index;
    for sibling in proof {
        current = if idx % 2 == 0 {
            hash_children(&current, sibling)
        } else {
            hash_children(sibling, &current)
        };
        idx /= 2;
    }
    current == *expected_root
}

/// An inclusion proof for one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Position of the leaf in append order.
    pub leaf_index: u64,
    /// Number of leaves in the tree the proof was built against.
    pub tree_size: u64,
    /// Index to feed the verifier. Bit `k` is set iff the node at proof
    /// step `k` is a right child.
    pub path_index: u64,
    /// Sibling hashes from the leaf level upward.
    pub siblings: Vec<Digest32>,
}

impl InclusionProof {
    /// Verify this proof for `leaf_hash` against `root`.
    pub fn verify(&self, leaf_hash: &Digest32, root: &Digest32) -> bool {
        verify_inclusion_proof(leaf_hash, &self.siblings, self.path_index, root)
    }
}

/// A fully materialized Merkle tree: every level from the leaves to the root.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Digest32>>,
}

impl MerkleTree {
    /// Build the tree over `leaves` in the given order.
    pub fn new(leaves: Vec<Digest32>) -> Self {
        let mut levels = vec![leaves];
        while let Some(top) = levels.last() {
            if top.len() <= 1 {
                break;
            }
            let next = next_level(top);
            levels.push(next);
        }
        Self { levels }
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    /// Whether the tree has no leaves.
    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    /// The ordered leaf hashes.
    pub fn leaves(&self) -> &[Digest32] {
        &self.levels[0]
    }

    /// The root. [`Digest32::ZERO`] for an empty tree.
    pub fn root(&self) -> Digest32 {
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or(Digest32::ZERO)
    }

    /// Build the inclusion proof for the leaf at `leaf_index`.
    pub fn inclusion_proof(&self, leaf_index: u64) -> Result<InclusionProof, MerkleError> {
        let size = self.len() as u64;
        if leaf_index >= size {
            return Err(MerkleError::LeafIndexOutOfRange {
                index: leaf_index,
                size,
            });
        }

        let mut pos = leaf_index as usize;
        let mut siblings = Vec::new();
        let mut path_index = 0u64;

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_pos = pos ^ 1;
            if sibling_pos < level.len() {
                if pos % 2 == 1 {
                    path_index |= 1 << siblings.len();
                }
                siblings.push(level[sibling_pos]);
            }
            pos /= 2;
        }

        Ok(InclusionProof {
            leaf_index,
            tree_size: size,
            path_index,
            siblings,
        })
    }
}
