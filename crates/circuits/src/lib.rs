//! ZK building blocks for anonymous ballots.
//!
//! This crate provides:
//! - `poseidon`: circomlib-compatible Poseidon, native and in-circuit
//! - `merkle`: the incremental Merkle tree the voter registry maintains
//! - `MembershipCircuit`: prove a commitment is registered without revealing which
//! - `encoding`: decimal/hex string encodings of field elements

pub mod encoding;
pub mod membership;
pub mod merkle;
pub mod poseidon;


pub use encoding::{fr_from_str, fr_to_decimal, EncodingError};
pub use membership::MembershipCircuit;
pub use merkle::{IncrementalMerkleTree, MerkleProof, TreeError};
pub use poseidon::{PoseidonError, PoseidonHasher};

use ark_bn254::Fr;

/// Common type aliases
pub type ConstraintF = Fr;

/// Registry depth used by the deployed voting contract.
pub const DEFAULT_TREE_DEPTH: usize = 3;
