//! Poseidon hash function for BN254.
//!
//! Matches circomlib's `Poseidon(n)` template bit for bit, so roots and
//! commitments computed here agree with the on-chain registry contract.
//! The round constants and MDS matrices come from `light-poseidon`; the
//! permutation itself is shared between the native hasher and the R1CS
//! gadget so both walk the exact same schedule.

mod config;
mod gadgets;
mod native;


use thiserror::Error;

pub use config::{circom_parameters, PoseidonParams, WIDTH_ONE, WIDTH_TWO};
pub use gadgets::{poseidon_hash_one_var, poseidon_hash_two_var, poseidon_hash_var};
pub use native::PoseidonHasher;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoseidonError {
    #[error("no circom parameters for state width {0}: {1}")]
    Parameters(u8, String),

    #[error("unsupported S-box exponent {0}, expected 5")]
    UnsupportedAlpha(u64),
}
