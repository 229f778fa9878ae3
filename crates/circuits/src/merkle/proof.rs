//! Merkle authentication paths.

use ark_bn254::Fr;

use crate::poseidon::PoseidonHasher;

/// Sibling hashes from the leaf level up, with the side the running node
/// sits on at each level (`true` = right child).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    elements: Vec<Fr>,
    indices: Vec<bool>,
}

impl MerkleProof {
    /// Create a new Merkle proof.
    ///
    /// Callers pass matching lengths; the tree always does.
    pub fn new(elements: Vec<Fr>, indices: Vec<bool>) -> Self {
        debug_assert_eq!(elements.len(), indices.len());
        Self { elements, indices }
    }

    /// An all-zero path, for circuit setup where only the shape matters.
    pub fn empty(depth: usize) -> Self {
        Self {
            elements: vec![Fr::from(0u64); depth],
            indices: vec![false; depth],
        }
    }

    pub fn elements(&self) -> &[Fr] {
        &self.elements
    }

    pub fn indices(&self) -> &[bool] {
        &self.indices
    }

    pub fn depth(&self) -> usize {
        self.elements.len()
    }

    /// Leaf position encoded by the direction bits.
    pub fn leaf_index(&self) -> u64 {
        self.indices
            .iter()
            .enumerate()
            .fold(0u64, |acc, (level, &right)| acc | ((right as u64) << level))
    }

    /// Fold `leaf` up the path to a root.
    pub fn compute_root(&self, leaf: Fr, hasher: &PoseidonHasher) -> Fr {
        self.elements
            .iter()
            .zip(self.indices.iter())
            .fold(leaf, |current, (sibling, &is_right)| {
                if is_right {
                    hasher.hash_two(*sibling, current)
                } else {
                    hasher.hash_two(current, *sibling)
                }
            })
    }

    pub fn verify(&self, leaf: Fr, root: Fr, hasher: &PoseidonHasher) -> bool {
        self.compute_root(leaf, hasher) == root
    }
}
