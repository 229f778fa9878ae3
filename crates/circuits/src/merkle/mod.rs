//! Incremental Merkle tree over Poseidon, matching the registry contract.
//!
//! Leaves are appended left to right. Empty slots hold the level's zero
//! value: `zeroes[0]` is the configured zero leaf and
//! `zeroes[i + 1] = H(zeroes[i], zeroes[i])`. Internal nodes are
//! `H(left, right)`.

mod gadgets;
mod proof;
mod tree;


use thiserror::Error;

pub use gadgets::{compute_root_from_path, MerkleProofVar};
pub use proof::MerkleProof;
pub use tree::{IncrementalMerkleTree, MAX_DEPTH};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("tree depth {0} out of range (1..={max})", max = MAX_DEPTH)]
    DepthOutOfRange(usize),

    #[error("tree of depth {depth} holds at most {capacity} leaves, got {attempted}")]
    Capacity {
        depth: usize,
        capacity: u64,
        attempted: u64,
    },

    #[error("commitment {commitment} is not registered")]
    NotFound { commitment: String },

    #[error("leaf index {index} out of range, tree has {len} leaves")]
    IndexOutOfRange { index: usize, len: usize },
}
