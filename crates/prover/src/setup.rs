//! Trusted setup utilities for generating proving and verifying keys.

use std::path::Path;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use rand::{rngs::StdRng, CryptoRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use ballot_circuits::{MembershipCircuit, PoseidonError, PoseidonHasher};

const PROVING_KEY_FILE: &str = "voting.pk";
const VERIFYING_KEY_FILE: &str = "voting.vk";
const MANIFEST_FILE: &str = "manifest.json";

/// Errors that can occur during setup
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Circuit setup failed: {0}")]
    CircuitSetup(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("Deserialization failed: {0}")]
    Deserialization(String),
    #[error("Keys in {dir} are for tree depth {found}, expected {expected}")]
    DepthMismatch {
        dir: String,
        expected: usize,
        found: usize,
    },
    #[error("Poseidon parameters unavailable: {0}")]
    Poseidon(#[from] PoseidonError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Keys for a single circuit
#[derive(Clone)]
pub struct CircuitKeyPair {
    pub proving_key: ProvingKey<Bn254>,
    pub verifying_key: VerifyingKey<Bn254>,
}

impl CircuitKeyPair {
    /// Serialize proving key to bytes
    pub fn serialize_pk(&self) -> Result<Vec<u8>, SetupError> {
        let mut bytes = Vec::new();
        self.proving_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| SetupError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Serialize verifying key to bytes
    pub fn serialize_vk(&self) -> Result<Vec<u8>, SetupError> {
        let mut bytes = Vec::new();
        self.verifying_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| SetupError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize proving key from bytes
    pub fn deserialize_pk(bytes: &[u8]) -> Result<ProvingKey<Bn254>, SetupError> {
        ProvingKey::deserialize_compressed(bytes)
            .map_err(|e| SetupError::Deserialization(e.to_string()))
    }

    /// Deserialize verifying key from bytes
    pub fn deserialize_vk(bytes: &[u8]) -> Result<VerifyingKey<Bn254>, SetupError> {
        VerifyingKey::deserialize_compressed(bytes)
            .map_err(|e| SetupError::Deserialization(e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    circuit: String,
    tree_depth: usize,
}

/// Membership circuit keys together with the tree depth they were built for.
#[derive(Clone)]
pub struct CircuitKeys {
    pub tree_depth: usize,
    pub voting: CircuitKeyPair,
}

impl CircuitKeys {
    /// Save keys and a small manifest to a directory
    pub fn save_to_directory(&self, dir: &Path) -> Result<(), SetupError> {
        std::fs::create_dir_all(dir)?;

        std::fs::write(dir.join(PROVING_KEY_FILE), self.voting.serialize_pk()?)?;
        std::fs::write(dir.join(VERIFYING_KEY_FILE), self.voting.serialize_vk()?)?;

        let manifest = Manifest {
            circuit: "voting".to_string(),
            tree_depth: self.tree_depth,
        };
        let manifest = serde_json::to_string_pretty(&manifest)
            .map_err(|e| SetupError::Serialization(e.to_string()))?;
        std::fs::write(dir.join(MANIFEST_FILE), manifest)?;

        Ok(())
    }

    /// Load keys from a directory
    pub fn load_from_directory(dir: &Path) -> Result<Self, SetupError> {
        let manifest: Manifest = serde_json::from_slice(&std::fs::read(dir.join(MANIFEST_FILE))?)
            .map_err(|e| SetupError::Deserialization(e.to_string()))?;

        let voting = CircuitKeyPair {
            proving_key: CircuitKeyPair::deserialize_pk(&std::fs::read(dir.join(PROVING_KEY_FILE))?)?,
            verifying_key: CircuitKeyPair::deserialize_vk(&std::fs::read(
                dir.join(VERIFYING_KEY_FILE),
            )?)?,
        };

        Ok(Self {
            tree_depth: manifest.tree_depth,
            voting,
        })
    }

    /// Load keys for `tree_depth`, running setup and saving when none exist.
    ///
    /// Keys for a different depth are an error rather than silently replaced.
    pub fn load_or_setup(dir: &Path, tree_depth: usize) -> Result<Self, SetupError> {
        if dir.join(MANIFEST_FILE).exists() {
            info!(dir = %dir.display(), "loading circuit keys");
            let keys = Self::load_from_directory(dir)?;
            if keys.tree_depth != tree_depth {
                return Err(SetupError::DepthMismatch {
                    dir: dir.display().to_string(),
                    expected: tree_depth,
                    found: keys.tree_depth,
                });
            }
            return Ok(keys);
        }

        info!(dir = %dir.display(), tree_depth, "running trusted setup");
        let keys = setup_all_circuits(tree_depth)?;
        keys.save_to_directory(dir)?;
        Ok(keys)
    }
}

/// Run trusted setup for the membership circuit
pub fn setup_all_circuits(tree_depth: usize) -> Result<CircuitKeys, SetupError> {
    let mut rng = StdRng::from_entropy();
    let hasher = PoseidonHasher::new()?;

    let voting = setup_voting(tree_depth, hasher, &mut rng)?;
    Ok(CircuitKeys { tree_depth, voting })
}

/// Setup the membership circuit for a tree of `tree_depth` levels
pub fn setup_voting<R: RngCore + CryptoRng>(
    tree_depth: usize,
    hasher: PoseidonHasher,
    rng: &mut R,
) -> Result<CircuitKeyPair, SetupError> {
    let circuit = MembershipCircuit::empty(tree_depth, hasher);
    let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(circuit, rng)
        .map_err(|e| SetupError::CircuitSetup(e.to_string()))?;

    Ok(CircuitKeyPair {
        proving_key: pk,
        verifying_key: vk,
    })
}
