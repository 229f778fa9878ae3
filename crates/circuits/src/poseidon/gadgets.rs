//! Poseidon R1CS gadgets for in-circuit hashing.

use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::fields::FieldVar;
use ark_relations::r1cs::SynthesisError;

use super::config::{is_full_round, round_constant, PoseidonParams};
use super::PoseidonHasher;

/// Hash `inputs` in-circuit with the given parameter set.
///
/// `inputs.len()` must be `params.width - 1`.
pub fn poseidon_hash_var(
    params: &PoseidonParams,
    inputs: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    if inputs.len() + 1 != params.width {
        return Err(SynthesisError::Unsatisfiable);
    }

    let mut state = Vec::with_capacity(params.width);
    state.push(FpVar::zero());
    state.extend(inputs.iter().cloned());

    let rounds = params.full_rounds + params.partial_rounds;
    for round in 0..rounds {
        for (i, s) in state.iter_mut().enumerate() {
            *s += round_constant(params, round, i);
        }

        if is_full_round(params, round) {
            for s in state.iter_mut() {
                *s = sbox(s)?;
            }
        } else {
            state[0] = sbox(&state[0])?;
        }

        state = (0..params.width)
            .map(|i| {
                state
                    .iter()
                    .zip(params.mds[i].iter())
                    .fold(FpVar::zero(), |acc, (x, m)| acc + x * *m)
            })
            .collect();
    }

    Ok(state.swap_remove(0))
}

/// H(x) in-circuit.
pub fn poseidon_hash_one_var(
    hasher: &PoseidonHasher,
    x: &FpVar<Fr>,
) -> Result<FpVar<Fr>, SynthesisError> {
    poseidon_hash_var(hasher.params_one(), std::slice::from_ref(x))
}

/// H(a, b) in-circuit.
pub fn poseidon_hash_two_var(
    hasher: &PoseidonHasher,
    a: &FpVar<Fr>,
    b: &FpVar<Fr>,
) -> Result<FpVar<Fr>, SynthesisError> {
    poseidon_hash_var(hasher.params_two(), &[a.clone(), b.clone()])
}

// x^5
fn sbox(x: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
    let x4 = x.square()?.square()?;
    Ok(x4 * x)
}
