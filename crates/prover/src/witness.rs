//! Membership witness assembly.

use ark_bn254::Fr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ballot_circuits::encoding::{fr_from_str, fr_to_decimal, EncodingError};
use ballot_circuits::{IncrementalMerkleTree, MembershipCircuit, MerkleProof, PoseidonHasher, TreeError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WitnessError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("leaf {index} is {found}, but H(secret, nullifier) is {expected}")]
    CommitmentMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("invalid circuit input {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

/// Public and private inputs of one membership proof, as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipWitness {
    pub secret: String,
    pub nullifier: String,
    pub nullifier_hash: String,
    pub root: String,
    pub path_elements: Vec<String>,
    /// "0" when the running node is a left child, "1" when right.
    pub path_indices: Vec<String>,
}

impl MembershipWitness {
    /// Inputs keyed by the circuit's signal names.
    pub fn to_circuit_input(&self) -> CircuitInput {
        CircuitInput {
            secret: self.secret.clone(),
            nullifier: self.nullifier.clone(),
            nullifier_hash: self.nullifier_hash.clone(),
            root: self.root.clone(),
            path_elements: self.path_elements.clone(),
            path_index: self.path_indices.clone(),
        }
    }
}

/// The `input.json` handed to a proving backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitInput {
    pub secret: String,
    pub nullifier: String,
    #[serde(rename = "nullifierHash")]
    pub nullifier_hash: String,
    pub root: String,
    pub path_elements: Vec<String>,
    pub path_index: Vec<String>,
}

impl CircuitInput {
    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }

    /// Rebuild the in-crate circuit from these strings.
    ///
    /// Values are taken as given, so an inconsistent input produces an
    /// unsatisfied constraint system rather than an error here.
    pub fn to_circuit(&self, hasher: PoseidonHasher) -> Result<MembershipCircuit, WitnessError> {
        if self.path_elements.len() != self.path_index.len() {
            return Err(WitnessError::InvalidInput {
                field: "path_index",
                reason: format!(
                    "{} indices for {} path elements",
                    self.path_index.len(),
                    self.path_elements.len()
                ),
            });
        }

        let elements = self
            .path_elements
            .iter()
            .map(|e| parse_field("path_elements", e))
            .collect::<Result<Vec<_>, _>>()?;
        let indices = self
            .path_index
            .iter()
            .map(|i| match i.trim() {
                "0" => Ok(false),
                "1" => Ok(true),
                other => Err(WitnessError::InvalidInput {
                    field: "path_index",
                    reason: format!("{other:?} is not 0 or 1"),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MembershipCircuit::from_parts(
            parse_field("secret", &self.secret)?,
            parse_field("nullifier", &self.nullifier)?,
            parse_field("nullifierHash", &self.nullifier_hash)?,
            parse_field("root", &self.root)?,
            MerkleProof::new(elements, indices),
            hasher,
        ))
    }
}

fn parse_field(field: &'static str, value: &str) -> Result<Fr, WitnessError> {
    fr_from_str(value).map_err(|e: EncodingError| WitnessError::InvalidInput {
        field,
        reason: e.to_string(),
    })
}

/// Builds [`MembershipWitness`]es against a rebuilt registry tree.
#[derive(Clone)]
pub struct WitnessAssembler {
    hasher: PoseidonHasher,
}

impl WitnessAssembler {
    pub fn new(hasher: PoseidonHasher) -> Self {
        Self { hasher }
    }

    /// H(secret, nullifier), the value registered on-chain.
    pub fn commitment(&self, secret: Fr, nullifier: Fr) -> Fr {
        self.hasher.hash_two(secret, nullifier)
    }

    pub fn assemble(
        &self,
        secret: Fr,
        nullifier: Fr,
        tree: &IncrementalMerkleTree,
        index: usize,
    ) -> Result<MembershipWitness, WitnessError> {
        let commitment = self.commitment(secret, nullifier);
        let leaf = tree.leaf(index).ok_or(TreeError::IndexOutOfRange {
            index,
            len: tree.len(),
        })?;
        if leaf != commitment {
            return Err(WitnessError::CommitmentMismatch {
                index,
                expected: fr_to_decimal(&commitment),
                found: fr_to_decimal(&leaf),
            });
        }

        let path = tree.sibling_path(index)?;

        Ok(MembershipWitness {
            secret: fr_to_decimal(&secret),
            nullifier: fr_to_decimal(&nullifier),
            nullifier_hash: fr_to_decimal(&self.hasher.hash_one(nullifier)),
            root: fr_to_decimal(&tree.root()),
            path_elements: path.elements().iter().map(fr_to_decimal).collect(),
            path_indices: path
                .indices()
                .iter()
                .map(|&right| if right { "1" } else { "0" }.to_string())
                .collect(),
        })
    }
}
