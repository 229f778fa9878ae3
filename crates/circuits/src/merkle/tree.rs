//! Append-only tree storage.

use ark_bn254::Fr;

use super::proof::MerkleProof;
use super::TreeError;
use crate::encoding::fr_to_decimal;
use crate::poseidon::PoseidonHasher;

/// Deepest supported tree (2^32 leaves).
pub const MAX_DEPTH: usize = 32;

/// Binary incremental Merkle tree.
///
/// Only populated nodes are stored; anything to the right of the last
/// insertion is implicitly the zero value of its level.
#[derive(Clone, Debug)]
pub struct IncrementalMerkleTree {
    depth: usize,
    hasher: PoseidonHasher,

    /// zeroes[level] = root of an empty subtree of that height
    zeroes: Vec<Fr>,

    /// nodes[0] = leaves in insertion order, nodes[level] = populated nodes
    nodes: Vec<Vec<Fr>>,

    root: Fr,
}

impl IncrementalMerkleTree {
    /// Create an empty tree.
    pub fn new(depth: usize, zero_value: Fr, hasher: PoseidonHasher) -> Result<Self, TreeError> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(TreeError::DepthOutOfRange(depth));
        }

        let mut zeroes = Vec::with_capacity(depth + 1);
        let mut zero = zero_value;
        for _ in 0..depth {
            zeroes.push(zero);
            zero = hasher.hash_two(zero, zero);
        }
        zeroes.push(zero);

        Ok(Self {
            depth,
            hasher,
            zeroes,
            nodes: vec![Vec::new(); depth],
            root: zero,
        })
    }

    /// Build a tree by inserting `leaves` in order.
    pub fn build(
        depth: usize,
        zero_value: Fr,
        hasher: PoseidonHasher,
        leaves: &[Fr],
    ) -> Result<Self, TreeError> {
        let mut tree = Self::new(depth, zero_value, hasher)?;

        if leaves.len() as u64 > tree.capacity() {
            return Err(TreeError::Capacity {
                depth,
                capacity: tree.capacity(),
                attempted: leaves.len() as u64,
            });
        }

        for leaf in leaves {
            tree.insert(*leaf)?;
        }
        Ok(tree)
    }

    /// Append a leaf and return the new root.
    pub fn insert(&mut self, leaf: Fr) -> Result<Fr, TreeError> {
        let mut index = self.nodes[0].len();
        if index as u64 >= self.capacity() {
            return Err(TreeError::Capacity {
                depth: self.depth,
                capacity: self.capacity(),
                attempted: index as u64 + 1,
            });
        }

        let mut node = leaf;
        for level in 0..self.depth {
            let row = &mut self.nodes[level];
            if index < row.len() {
                row[index] = node;
            } else {
                row.push(node);
            }

            node = if index & 1 == 0 {
                let right = row.get(index + 1).copied().unwrap_or(self.zeroes[level]);
                self.hasher.hash_two(node, right)
            } else {
                let left = row.get(index - 1).copied().unwrap_or(self.zeroes[level]);
                self.hasher.hash_two(left, node)
            };
            index >>= 1;
        }

        self.root = node;
        Ok(node)
    }

    /// Position of the first leaf equal to `leaf`.
    pub fn index_of(&self, leaf: &Fr) -> Option<usize> {
        self.nodes[0].iter().position(|l| l == leaf)
    }

    /// Like [`Self::index_of`], but a missing leaf is an error.
    pub fn locate(&self, leaf: &Fr) -> Result<usize, TreeError> {
        self.index_of(leaf).ok_or_else(|| TreeError::NotFound {
            commitment: fr_to_decimal(leaf),
        })
    }

    /// Authentication path for the leaf at `index`, bottom level first.
    pub fn sibling_path(&self, index: usize) -> Result<MerkleProof, TreeError> {
        if index >= self.len() {
            return Err(TreeError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }

        let mut elements = Vec::with_capacity(self.depth);
        let mut indices = Vec::with_capacity(self.depth);
        let mut idx = index;

        for level in 0..self.depth {
            let sibling = self.nodes[level]
                .get(idx ^ 1)
                .copied()
                .unwrap_or(self.zeroes[level]);
            elements.push(sibling);
            indices.push(idx & 1 == 1);
            idx >>= 1;
        }

        Ok(MerkleProof::new(elements, indices))
    }

    pub fn root(&self) -> Fr {
        self.root
    }

    pub fn leaf(&self, index: usize) -> Option<Fr> {
        self.nodes[0].get(index).copied()
    }

    pub fn leaves(&self) -> &[Fr] {
        &self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn zero_value(&self) -> Fr {
        self.zeroes[0]
    }

    /// Empty-subtree hashes, `zeroes()[depth]` being the empty root.
    pub fn zeroes(&self) -> &[Fr] {
        &self.zeroes
    }

    pub fn hasher(&self) -> &PoseidonHasher {
        &self.hasher
    }
}
