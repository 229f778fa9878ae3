//! Circom-compatible parameter sets.

use ark_bn254::Fr;
use light_poseidon::parameters::bn254_x5::get_poseidon_parameters;
use light_poseidon::PoseidonParameters;

use super::PoseidonError;

/// State width for a single-input hash (capacity element + 1 input).
pub const WIDTH_ONE: u8 = 2;

/// State width for a two-input hash.
pub const WIDTH_TWO: u8 = 3;

pub type PoseidonParams = PoseidonParameters<Fr>;

/// Load circomlib's BN254 x^5 parameters for the given state width.
pub fn circom_parameters(width: u8) -> Result<PoseidonParams, PoseidonError> {
    let params = get_poseidon_parameters::<Fr>(width)
        .map_err(|e| PoseidonError::Parameters(width, e.to_string()))?;

    if params.alpha != 5 {
        return Err(PoseidonError::UnsupportedAlpha(params.alpha));
    }

    Ok(params)
}

/// True when round `round` applies the S-box to the whole state.
///
/// Full rounds are split evenly around the partial rounds.
pub(crate) fn is_full_round(params: &PoseidonParams, round: usize) -> bool {
    let half = params.full_rounds / 2;
    round < half || round >= half + params.partial_rounds
}

/// Round constant for state slot `i` in round `round`.
pub(crate) fn round_constant(params: &PoseidonParams, round: usize, i: usize) -> Fr {
    params.ark[round * params.width + i]
}
