//! In-circuit Merkle path verification.

use ark_bn254::Fr;
use ark_r1cs_std::{boolean::Boolean, fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use super::proof::MerkleProof;
use crate::poseidon::{poseidon_hash_two_var, PoseidonHasher};

/// Circuit variable representation of a Merkle proof.
#[derive(Clone)]
pub struct MerkleProofVar {
    path: Vec<FpVar<Fr>>,
    indices: Vec<Boolean<Fr>>,
}

impl MerkleProofVar {
    /// Allocate a Merkle proof as witness variables.
    pub fn new_witness(
        cs: ConstraintSystemRef<Fr>,
        proof: &MerkleProof,
    ) -> Result<Self, SynthesisError> {
        let path = proof
            .elements()
            .iter()
            .map(|h| FpVar::new_witness(cs.clone(), || Ok(*h)))
            .collect::<Result<Vec<_>, _>>()?;

        let indices = proof
            .indices()
            .iter()
            .map(|&b| Boolean::new_witness(cs.clone(), || Ok(b)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { path, indices })
    }

    pub fn path(&self) -> &[FpVar<Fr>] {
        &self.path
    }

    pub fn indices(&self) -> &[Boolean<Fr>] {
        &self.indices
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Compute the root reached from `leaf` along `proof`.
pub fn compute_root_from_path(
    hasher: &PoseidonHasher,
    leaf: &FpVar<Fr>,
    proof: &MerkleProofVar,
) -> Result<FpVar<Fr>, SynthesisError> {
    let mut current = leaf.clone();

    for (sibling, is_right) in proof.path.iter().zip(proof.indices.iter()) {
        // If is_right: H(sibling, current), else H(current, sibling)
        let left = is_right.select(sibling, &current)?;
        let right = is_right.select(&current, sibling)?;

        current = poseidon_hash_two_var(hasher, &left, &right)?;
    }

    Ok(current)
}
