//! Membership circuit for anonymous ballots.
//!
//! Proves knowledge of `(secret, nullifier)` such that
//! `H(secret, nullifier)` is a leaf of the registry tree with root `root`,
//! and that `nullifier_hash = H(nullifier)`.
//!
//! Public inputs, in order: `[root, nullifier_hash]`.

use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use crate::merkle::{compute_root_from_path, MerkleProof, MerkleProofVar};
use crate::poseidon::{poseidon_hash_one_var, poseidon_hash_two_var, PoseidonHasher};

/// Membership circuit over a tree of fixed depth.
#[derive(Clone)]
pub struct MembershipCircuit {
    // Public inputs
    pub root: Option<Fr>,
    pub nullifier_hash: Option<Fr>,

    // Witnesses
    pub secret: Option<Fr>,
    pub nullifier: Option<Fr>,
    pub path: MerkleProof,

    hasher: PoseidonHasher,
}

impl MembershipCircuit {
    /// Create an empty circuit for setup.
    /// Only the depth of the dummy path affects the constraint structure.
    pub fn empty(depth: usize, hasher: PoseidonHasher) -> Self {
        Self {
            root: Some(Fr::from(0u64)),
            nullifier_hash: Some(Fr::from(0u64)),
            secret: Some(Fr::from(0u64)),
            nullifier: Some(Fr::from(0u64)),
            path: MerkleProof::empty(depth),
            hasher,
        }
    }

    /// Create a circuit with witnesses, deriving the nullifier hash.
    pub fn new(
        secret: Fr,
        nullifier: Fr,
        root: Fr,
        path: MerkleProof,
        hasher: PoseidonHasher,
    ) -> Self {
        let nullifier_hash = hasher.hash_one(nullifier);
        Self::from_parts(secret, nullifier, nullifier_hash, root, path, hasher)
    }

    /// Create a circuit from already-derived public values.
    ///
    /// Nothing is recomputed, so inconsistent values leave the constraint
    /// system unsatisfied rather than being silently corrected.
    pub fn from_parts(
        secret: Fr,
        nullifier: Fr,
        nullifier_hash: Fr,
        root: Fr,
        path: MerkleProof,
        hasher: PoseidonHasher,
    ) -> Self {
        Self {
            root: Some(root),
            nullifier_hash: Some(nullifier_hash),
            secret: Some(secret),
            nullifier: Some(nullifier),
            path,
            hasher,
        }
    }

    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    /// Public inputs in allocation order.
    pub fn public_inputs(&self) -> Option<Vec<Fr>> {
        Some(vec![self.root?, self.nullifier_hash?])
    }
}

impl ConstraintSynthesizer<Fr> for MembershipCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // === Allocate public inputs ===
        let root_var = FpVar::new_input(cs.clone(), || {
            self.root.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let nullifier_hash_var = FpVar::new_input(cs.clone(), || {
            self.nullifier_hash.ok_or(SynthesisError::AssignmentMissing)
        })?;

        // === Allocate witnesses ===
        let secret_var = FpVar::new_witness(cs.clone(), || {
            self.secret.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let nullifier_var = FpVar::new_witness(cs.clone(), || {
            self.nullifier.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let path_var = MerkleProofVar::new_witness(cs.clone(), &self.path)?;

        // === Constraint 1: nullifier_hash = H(nullifier) ===
        let computed_nullifier_hash = poseidon_hash_one_var(&self.hasher, &nullifier_var)?;
        computed_nullifier_hash.enforce_equal(&nullifier_hash_var)?;

        // === Constraint 2: H(secret, nullifier) is a leaf under root ===
        let commitment = poseidon_hash_two_var(&self.hasher, &secret_var, &nullifier_var)?;
        let computed_root = compute_root_from_path(&self.hasher, &commitment, &path_var)?;
        computed_root.enforce_equal(&root_var)?;

        Ok(())
    }
}
