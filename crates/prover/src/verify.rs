//! Local proof verification.
//!
//! Mirrors what the on-chain verifier does with a [`ProofArtifact`], so a
//! bad proof is caught before any transaction is built.

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_groth16::{Groth16, Proof, VerifyingKey};
use ark_snark::SNARK;
use thiserror::Error;

use ballot_circuits::encoding::{field_from_str, EncodingError};

use crate::calldata::ProofArtifact;

/// Errors during verification
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Verification failed: {0}")]
    Verification(String),
    #[error("Invalid public inputs: {0}")]
    InvalidInputs(EncodingError),
    #[error("Invalid coordinate in {0}: {1}")]
    InvalidCoordinate(&'static str, EncodingError),
    #[error("{0} is not a valid curve point")]
    InvalidPoint(&'static str),
}

fn fq(name: &'static str, value: &str) -> Result<Fq, VerifyError> {
    field_from_str(value).map_err(|e| VerifyError::InvalidCoordinate(name, e))
}

fn g1(name: &'static str, coords: &[String; 2]) -> Result<G1Affine, VerifyError> {
    let point = G1Affine::new_unchecked(fq(name, &coords[0])?, fq(name, &coords[1])?);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(VerifyError::InvalidPoint(name));
    }
    Ok(point)
}

/// Rebuild the Groth16 proof, undoing the `[c1, c0]` ordering of `b`.
pub fn proof_from_artifact(artifact: &ProofArtifact) -> Result<Proof<Bn254>, VerifyError> {
    let a = g1("a", &artifact.a)?;

    let [bx, by] = &artifact.b;
    let b = G2Affine::new_unchecked(
        Fq2::new(fq("b", &bx[1])?, fq("b", &bx[0])?),
        Fq2::new(fq("b", &by[1])?, fq("b", &by[0])?),
    );
    if !b.is_on_curve() || !b.is_in_correct_subgroup_assuming_on_curve() {
        return Err(VerifyError::InvalidPoint("b"));
    }

    Ok(Proof {
        a,
        b,
        c: g1("c", &artifact.c)?,
    })
}

/// Verify an artifact's proof against its own public inputs.
pub fn verify_artifact(vk: &VerifyingKey<Bn254>, artifact: &ProofArtifact) -> Result<bool, VerifyError> {
    let proof = proof_from_artifact(artifact)?;
    let public_inputs = artifact
        .public_inputs
        .iter()
        .map(|s| field_from_str::<Fr>(s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(VerifyError::InvalidInputs)?;

    Groth16::<Bn254>::verify(vk, &public_inputs, &proof)
        .map_err(|e| VerifyError::Verification(e.to_string()))
}

/// Verify a membership proof (public inputs: root, nullifier hash)
pub fn verify_membership(
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    root: Fr,
    nullifier_hash: Fr,
) -> Result<bool, VerifyError> {
    let public_inputs = vec![root, nullifier_hash];

    Groth16::<Bn254>::verify(vk, &public_inputs, proof)
        .map_err(|e| VerifyError::Verification(e.to_string()))
}
