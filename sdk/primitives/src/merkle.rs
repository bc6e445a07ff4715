//! Merkle Paths for Note Commitments
//!
//! The wallet never maintains the pool's tree; it only needs membership
//! paths to feed proofs. The sparse tree below is enough to build those
//! paths locally and to check them before proving.
//!
//! ```text
//!                    Root
//!                   /    \
//!                 H01    H23
//!                /  \   /   \
//!               C0  C1 C2   C3  (Note Commitments)
//! ```
//!
//! Path convention, shared with the circuits:
//! `indices[i] == true` means the current node is the right child at
//! level `i`, so the parent is `H(sibling, current)`; otherwise it is
//! `H(current, sibling)`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::MerkleError;
use crate::field::FieldElement;
use crate::mimc::hash_2;

/// Depth of the pool tree; every path carries exactly this many levels
pub const TREE_DEPTH: usize = 32;

/// Number of leaves a full tree holds
pub const TREE_CAPACITY: u64 = 1 << TREE_DEPTH;

/// Hash two children to get their parent
pub fn hash_pair(left: FieldElement, right: FieldElement) -> FieldElement {
    FieldElement::from_inner(hash_2(left.inner(), right.inner()))
}

/// Fold a leaf up its authentication path
pub fn compute_root(
    leaf: FieldElement,
    siblings: &[FieldElement],
    indices: &[bool],
) -> FieldElement {
    siblings
        .iter()
        .zip(indices.iter())
        .fold(leaf, |current, (sibling, is_right)| {
            if *is_right {
                hash_pair(*sibling, current)
            } else {
                hash_pair(current, *sibling)
            }
        })
}

/// A Merkle path proving inclusion of a commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    /// Leaf level first
    pub siblings: Vec<FieldElement>,
    /// Position bits (false = left, true = right)
    pub indices: Vec<bool>,
}

impl MerklePath {
    /// Whether the path has the full tree depth
    pub fn is_full_depth(&self) -> bool {
        self.siblings.len() == TREE_DEPTH && self.indices.len() == TREE_DEPTH
    }

    pub fn root(&self, leaf: FieldElement) -> FieldElement {
        compute_root(leaf, &self.siblings, &self.indices)
    }

    /// Full depth and folds `leaf` up to `root`
    pub fn verify(&self, leaf: FieldElement, root: FieldElement) -> bool {
        self.is_full_depth() && self.root(leaf) == root
    }

    /// Leaf position encoded by the first `TREE_DEPTH` index bits
    pub fn position(&self) -> u64 {
        self.indices
            .iter()
            .take(TREE_DEPTH)
            .enumerate()
            .fold(0u64, |pos, (level, is_right)| {
                if *is_right { pos | (1u64 << level) } else { pos }
            })
    }
}

/// Sparse Merkle tree over note commitments
///
/// Only non-empty nodes are stored; empty subtrees use precomputed roots.
pub struct MerkleTree {
    /// (level, index) -> hash, written nodes only
    nodes: HashMap<(usize, u64), FieldElement>,
    /// empty_roots[h]: root of an all-empty subtree of height h
    empty_roots: Vec<FieldElement>,
    next_index: u64,
    root: FieldElement,
}

impl MerkleTree {
    pub fn new() -> Self {
        let empty_roots = empty_roots();
        let root = empty_roots[TREE_DEPTH];

        Self {
            nodes: HashMap::new(),
            empty_roots,
            next_index: 0,
            root,
        }
    }

    pub fn root(&self) -> FieldElement {
        self.root
    }

    pub fn next_position(&self) -> u64 {
        self.next_index
    }

    /// Root of an empty subtree of the given height
    pub fn empty_root(&self, level: usize) -> FieldElement {
        self.empty_roots[level]
    }

    /// Append a commitment, returning its leaf position
    pub fn insert(&mut self, commitment: FieldElement) -> Result<u64, MerkleError> {
        let position = self.next_index;
        self.insert_at(position, commitment)?;
        Ok(position)
    }

    /// Place a commitment at a known position, e.g. when replaying pool events
    pub fn insert_at(
        &mut self,
        position: u64,
        commitment: FieldElement,
    ) -> Result<(), MerkleError> {
        if position >= TREE_CAPACITY {
            return Err(MerkleError::PositionOutOfRange(position));
        }
        self.nodes.insert((0, position), commitment);

        let mut current_index = position;
        let mut current_hash = commitment;

        for level in 0..TREE_DEPTH {
            let is_right = current_index & 1 == 1;
            let sibling = self.node(level, current_index ^ 1);

            current_hash = if is_right {
                hash_pair(sibling, current_hash)
            } else {
                hash_pair(current_hash, sibling)
            };
            current_index /= 2;

            self.nodes.insert((level + 1, current_index), current_hash);
        }

        self.next_index = self.next_index.max(position + 1);
        self.root = current_hash;
        Ok(())
    }

    pub fn path(&self, position: u64) -> Option<MerklePath> {
        if position >= self.next_index {
            return None;
        }

        let mut siblings = Vec::with_capacity(TREE_DEPTH);
        let mut indices = Vec::with_capacity(TREE_DEPTH);
        let mut current_index = position;

        for level in 0..TREE_DEPTH {
            indices.push(current_index & 1 == 1);
            siblings.push(self.node(level, current_index ^ 1));
            current_index /= 2;
        }

        Some(MerklePath { siblings, indices })
    }

    /// Commitment stored at a position
    pub fn get(&self, position: u64) -> Option<FieldElement> {
        self.nodes.get(&(0, position)).copied()
    }

    fn node(&self, level: usize, index: u64) -> FieldElement {
        self.nodes
            .get(&(level, index))
            .copied()
            .unwrap_or(self.empty_roots[level])
    }
}

impl Default for MerkleTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Empty leaf is zero; each level up hashes two copies of the level below
fn empty_roots() -> Vec<FieldElement> {
    let mut roots = Vec::with_capacity(TREE_DEPTH + 1);
    let mut current = FieldElement::zero();
    roots.push(current);
    for _ in 0..TREE_DEPTH {
        current = hash_pair(current, current);
        roots.push(current);
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(v: u64) -> FieldElement {
        FieldElement::from_u64(v)
    }

    #[test]
    fn test_empty_tree() {
        let tree = MerkleTree::new();
        assert_eq!(tree.next_position(), 0);
        assert_eq!(tree.root(), tree.empty_root(TREE_DEPTH));
        assert!(tree.path(0).is_none());
    }

    #[test]
    fn test_insert_and_path() {
        let mut tree = MerkleTree::new();

        let pos1 = tree.insert(fe(1)).unwrap();
        let pos2 = tree.insert(fe(2)).unwrap();
        assert_eq!((pos1, pos2), (0, 1));

        let path1 = tree.path(0).unwrap();
        assert!(path1.verify(fe(1), tree.root()));
        assert_eq!(path1.position(), 0);

        let path2 = tree.path(1).unwrap();
        assert!(path2.verify(fe(2), tree.root()));
        assert_eq!(path2.position(), 1);
        assert!(path2.indices[0], "second leaf is a right child");
    }

    #[test]
    fn test_path_invalid_commitment() {
        let mut tree = MerkleTree::new();
        tree.insert(fe(1)).unwrap();

        let path = tree.path(0).unwrap();
        assert!(!path.verify(fe(99), tree.root()));
    }

    #[test]
    fn test_ordering_rule_at_first_level() {
        let mut tree = MerkleTree::new();
        tree.insert(fe(10)).unwrap();
        tree.insert(fe(20)).unwrap();

        let path = tree.path(1).unwrap();
        let level1 = hash_pair(path.siblings[0], fe(20));
        assert_eq!(level1, hash_pair(fe(10), fe(20)));
        assert_ne!(level1, hash_pair(fe(20), fe(10)));
    }

    #[test]
    fn test_insert_at_sparse_position() {
        let mut tree = MerkleTree::new();
        tree.insert_at(5, fe(55)).unwrap();

        let path = tree.path(5).unwrap();
        assert_eq!(path.position(), 5);
        assert!(path.verify(fe(55), tree.root()));
        assert_eq!(tree.get(5), Some(fe(55)));
        assert_eq!(tree.next_position(), 6);
    }

    #[test]
    fn test_short_path_never_verifies() {
        let mut tree = MerkleTree::new();
        tree.insert(fe(1)).unwrap();
        let mut path = tree.path(0).unwrap();
        path.siblings.pop();
        path.indices.pop();

        assert!(!path.verify(fe(1), tree.root()));
    }

    #[test]
    fn test_positions_beyond_capacity_rejected() {
        let mut tree = MerkleTree::new();
        tree.insert(fe(1)).unwrap();
        let root = tree.root();

        for position in [TREE_CAPACITY, TREE_CAPACITY + 1, u64::MAX] {
            assert_eq!(
                tree.insert_at(position, fe(2)),
                Err(MerkleError::PositionOutOfRange(position))
            );
        }
        assert_eq!(tree.root(), root);
        assert_eq!(tree.next_position(), 1);
        assert!(tree.path(0).unwrap().verify(fe(1), tree.root()));
    }

    #[test]
    fn test_last_position_fills_tree() {
        let mut tree = MerkleTree::new();
        tree.insert_at(TREE_CAPACITY - 1, fe(9)).unwrap();

        let path = tree.path(TREE_CAPACITY - 1).unwrap();
        assert_eq!(path.position(), TREE_CAPACITY - 1);
        assert!(path.verify(fe(9), tree.root()));
        assert_eq!(
            tree.insert(fe(10)),
            Err(MerkleError::PositionOutOfRange(TREE_CAPACITY))
        );
    }

    #[test]
    fn test_position_ignores_extra_index_bits() {
        let path = MerklePath {
            siblings: vec![FieldElement::zero(); 70],
            indices: vec![true; 70],
        };
        assert_eq!(path.position(), TREE_CAPACITY - 1);
        assert!(!path.is_full_depth());
    }
}
