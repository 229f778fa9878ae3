//! Native Poseidon hashing (outside circuits).
//!
//! The permutation below walks the same round schedule as
//! [`super::poseidon_hash_var`], so a witness computed here is one
//! the circuit accepts. `light_poseidon` only supplies the parameters; its
//! own hasher is the reference in `test_matches_light_poseidon` and
//! `test_gadget_matches_light_poseidon`.

use std::sync::Arc;

use ark_bn254::Fr;
use ark_ff::{Field, Zero};

use super::config::{circom_parameters, is_full_round, round_constant, PoseidonParams};
use super::config::{WIDTH_ONE, WIDTH_TWO};
use super::PoseidonError;

/// Circom-compatible Poseidon over BN254 for one and two inputs.
///
/// Cheap to clone; the parameter tables are shared.
#[derive(Clone)]
pub struct PoseidonHasher {
    one: Arc<PoseidonParams>,
    two: Arc<PoseidonParams>,
}

impl std::fmt::Debug for PoseidonHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseidonHasher").finish_non_exhaustive()
    }
}

impl PoseidonHasher {
    pub fn new() -> Result<Self, PoseidonError> {
        Ok(Self {
            one: Arc::new(circom_parameters(WIDTH_ONE)?),
            two: Arc::new(circom_parameters(WIDTH_TWO)?),
        })
    }

    /// Parameters for `Poseidon(1)`.
    pub fn params_one(&self) -> &PoseidonParams {
        &self.one
    }

    /// Parameters for `Poseidon(2)`.
    pub fn params_two(&self) -> &PoseidonParams {
        &self.two
    }

    /// H(x), used for the nullifier hash.
    pub fn hash_one(&self, x: Fr) -> Fr {
        hash_with(&self.one, &[x])
    }

    /// H(a, b), used for commitments and internal tree nodes.
    pub fn hash_two(&self, a: Fr, b: Fr) -> Fr {
        hash_with(&self.two, &[a, b])
    }
}

fn hash_with(params: &PoseidonParams, inputs: &[Fr]) -> Fr {
    let mut state = vec![Fr::zero(); params.width];
    state[1..].copy_from_slice(inputs);
    permute(params, &mut state);
    state[0]
}

/// Apply the full Poseidon permutation in place.
fn permute(params: &PoseidonParams, state: &mut [Fr]) {
    let rounds = params.full_rounds + params.partial_rounds;

    for round in 0..rounds {
        for (i, s) in state.iter_mut().enumerate() {
            *s += round_constant(params, round, i);
        }

        if is_full_round(params, round) {
            for s in state.iter_mut() {
                *s = s.pow([params.alpha]);
            }
        } else {
            state[0] = state[0].pow([params.alpha]);
        }

        let prev = state.to_vec();
        for (i, s) in state.iter_mut().enumerate() {
            *s = prev
                .iter()
                .zip(params.mds[i].iter())
                .fold(Fr::zero(), |acc, (x, m)| acc + *x * m);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let hasher = PoseidonHasher::new().unwrap();
        let a = Fr::from(42u64);
        let b = Fr::from(123u64);

        assert_eq!(hasher.hash_two(a, b), hasher.hash_two(a, b));
    }

    #[test]
    fn test_hash_is_order_sensitive() {
        let hasher = PoseidonHasher::new().unwrap();
        let a = Fr::from(1u64);
        let b = Fr::from(2u64);

        assert_ne!(hasher.hash_two(a, b), hasher.hash_two(b, a));
    }

    #[test]
    fn test_one_and_two_differ() {
        let hasher = PoseidonHasher::new().unwrap();
        let x = Fr::from(7u64);

        assert_ne!(hasher.hash_one(x), hasher.hash_two(x, Fr::zero()));
    }
}
