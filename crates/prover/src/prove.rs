//! Proof generation.
//!
//! A [`ProvingBackend`] turns a [`CircuitInput`] into a proof in snarkjs'
//! JSON shape. [`ProofEngine`] drives a backend and post-processes the
//! result into verifier call arguments.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, Proof};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};
use ark_snark::SNARK;
use rand::{rngs::StdRng, SeedableRng};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use ballot_circuits::encoding::{field_to_decimal, fr_to_decimal, normalize_integer_string};
use ballot_circuits::{MembershipCircuit, PoseidonHasher};

use crate::calldata::{CalldataError, ProofArtifact};
use crate::setup::CircuitKeyPair;
use crate::witness::{CircuitInput, MembershipWitness, WitnessError};

/// Errors during proof generation
#[derive(Error, Debug)]
pub enum ProvingError {
    #[error("Invalid witness: {0}")]
    InvalidInput(#[from] WitnessError),
    #[error("Witness does not satisfy the circuit: {0}")]
    Unsatisfied(String),
    #[error("Circuit expects a path of depth {expected}, got {actual}")]
    DepthMismatch { expected: usize, actual: usize },
    #[error("Circuit artifact missing: {0}")]
    ArtifactMissing(PathBuf),
    #[error("Proof generation failed: {0}")]
    ProofGeneration(String),
    #[error("Proving timed out after {0:?}")]
    Timeout(Duration),
    #[error("Malformed backend output: {0}")]
    MalformedOutput(String),
    #[error("Public signals {actual:?} do not include root and nullifier hash {expected:?}")]
    PublicSignalMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CalldataError> for ProvingError {
    fn from(e: CalldataError) -> Self {
        ProvingError::MalformedOutput(e.to_string())
    }
}

/// Groth16 proof as snarkjs writes `proof.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarkjsProof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
}

impl SnarkjsProof {
    /// Projective-style encoding of an arkworks proof (`z = 1`).
    pub fn from_groth16(proof: &Proof<Bn254>) -> Self {
        Self {
            pi_a: vec![
                field_to_decimal(&proof.a.x),
                field_to_decimal(&proof.a.y),
                "1".to_string(),
            ],
            pi_b: vec![
                vec![field_to_decimal(&proof.b.x.c0), field_to_decimal(&proof.b.x.c1)],
                vec![field_to_decimal(&proof.b.y.c0), field_to_decimal(&proof.b.y.c1)],
                vec!["1".to_string(), "0".to_string()],
            ],
            pi_c: vec![
                field_to_decimal(&proof.c.x),
                field_to_decimal(&proof.c.y),
                "1".to_string(),
            ],
            protocol: Some("groth16".to_string()),
            curve: Some("bn128".to_string()),
        }
    }
}

/// Backend output: the proof and its public signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProof {
    pub proof: SnarkjsProof,
    pub public_signals: Vec<String>,
}

#[async_trait]
pub trait ProvingBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn full_prove(&self, input: &CircuitInput) -> Result<RawProof, ProvingError>;
}

/// In-process Groth16 over [`ballot_circuits::MembershipCircuit`].
#[derive(Clone)]
pub struct ArkworksBackend {
    keys: Arc<CircuitKeyPair>,
    tree_depth: usize,
    hasher: PoseidonHasher,
}

impl ArkworksBackend {
    pub fn new(keys: Arc<CircuitKeyPair>, tree_depth: usize, hasher: PoseidonHasher) -> Self {
        Self {
            keys,
            tree_depth,
            hasher,
        }
    }
}

#[async_trait]
impl ProvingBackend for ArkworksBackend {
    fn name(&self) -> &'static str {
        "arkworks"
    }

    async fn full_prove(&self, input: &CircuitInput) -> Result<RawProof, ProvingError> {
        if input.depth() != self.tree_depth {
            return Err(ProvingError::DepthMismatch {
                expected: self.tree_depth,
                actual: input.depth(),
            });
        }

        let circuit = input.to_circuit(self.hasher.clone())?;
        let public_inputs = circuit
            .public_inputs()
            .ok_or_else(|| ProvingError::ProofGeneration("missing public inputs".into()))?;

        let keys = self.keys.clone();
        let proof = tokio::task::spawn_blocking(move || prove_blocking(&keys, circuit))
            .await
            .map_err(|e| ProvingError::ProofGeneration(e.to_string()))??;

        Ok(RawProof {
            proof: SnarkjsProof::from_groth16(&proof),
            public_signals: public_inputs.iter().map(fr_to_decimal).collect(),
        })
    }
}

/// Synthesis and proving both run here, off the async workers.
fn prove_blocking(keys: &CircuitKeyPair, circuit: MembershipCircuit) -> Result<Proof<Bn254>, ProvingError> {
    // Groth16::prove does not check satisfiability, so do it first.
    check_satisfied(circuit.clone())?;

    let mut rng = StdRng::from_entropy();
    Groth16::<Bn254>::prove(&keys.proving_key, circuit, &mut rng)
        .map_err(|e| ProvingError::ProofGeneration(e.to_string()))
}

fn check_satisfied(circuit: MembershipCircuit) -> Result<(), ProvingError> {
    let cs = ConstraintSystem::<Fr>::new_ref();
    circuit
        .generate_constraints(cs.clone())
        .map_err(|e| ProvingError::ProofGeneration(e.to_string()))?;

    let satisfied = cs
        .is_satisfied()
        .map_err(|e| ProvingError::ProofGeneration(e.to_string()))?;
    if satisfied {
        return Ok(());
    }

    let which = cs.which_is_unsatisfied().ok().flatten();
    Err(ProvingError::Unsatisfied(
        which.unwrap_or_else(|| "unknown constraint".to_string()),
    ))
}

/// `snarkjs groth16 fullprove` with circom artifacts.
#[derive(Debug, Clone)]
pub struct SnarkjsBackend {
    snarkjs_bin: PathBuf,
    wasm: PathBuf,
    zkey: PathBuf,
    timeout: Duration,
}

impl SnarkjsBackend {
    pub fn new(snarkjs_bin: impl Into<PathBuf>, wasm: PathBuf, zkey: PathBuf, timeout: Duration) -> Self {
        Self {
            snarkjs_bin: snarkjs_bin.into(),
            wasm,
            zkey,
            timeout,
        }
    }

    /// Artifacts at `<dir>/voting/Voting.wasm` and `<dir>/voting/circuit_final.zkey`.
    pub fn from_artifacts_dir(snarkjs_bin: impl Into<PathBuf>, dir: &Path, timeout: Duration) -> Self {
        let voting = dir.join("voting");
        Self::new(
            snarkjs_bin,
            voting.join("Voting.wasm"),
            voting.join("circuit_final.zkey"),
            timeout,
        )
    }

    pub fn wasm(&self) -> &Path {
        &self.wasm
    }

    pub fn zkey(&self) -> &Path {
        &self.zkey
    }
}

#[async_trait]
impl ProvingBackend for SnarkjsBackend {
    fn name(&self) -> &'static str {
        "snarkjs"
    }

    async fn full_prove(&self, input: &CircuitInput) -> Result<RawProof, ProvingError> {
        for artifact in [&self.wasm, &self.zkey] {
            if !artifact.is_file() {
                return Err(ProvingError::ArtifactMissing(artifact.clone()));
            }
        }

        let dir = tempfile::Builder::new().prefix("ballot_fullprove").tempdir()?;
        let input_path = dir.path().join("input.json");
        let proof_path = dir.path().join("proof.json");
        let public_path = dir.path().join("public.json");

        let input_json = serde_json::to_vec(input)
            .map_err(|e| ProvingError::ProofGeneration(e.to_string()))?;
        tokio::fs::write(&input_path, input_json).await?;

        debug!(bin = %self.snarkjs_bin.display(), "spawning snarkjs groth16 fullprove");
        let mut command = tokio::process::Command::new(&self.snarkjs_bin);
        command
            .arg("groth16")
            .arg("fullprove")
            .arg(&input_path)
            .arg(&self.wasm)
            .arg(&self.zkey)
            .arg(&proof_path)
            .arg(&public_path)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ProvingError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let message = if stderr.is_empty() { stdout } else { stderr };
            // circom witness calculators report failed constraints as asserts
            if message.contains("Assert Failed") {
                return Err(ProvingError::Unsatisfied(message));
            }
            return Err(ProvingError::ProofGeneration(format!(
                "snarkjs exited with {:?}: {}",
                output.status.code(),
                message
            )));
        }

        let proof: SnarkjsProof = read_json(&proof_path).await?;
        let public_signals: Vec<String> = read_json(&public_path).await?;

        Ok(RawProof {
            proof,
            public_signals,
        })
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ProvingError> {
    let bytes = tokio::fs::read(path).await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ProvingError::MalformedOutput(format!("{}: {}", path.display(), e)))
}

/// Runtime choice of proving backend.
#[derive(Clone)]
pub enum Backend {
    Arkworks(ArkworksBackend),
    Snarkjs(SnarkjsBackend),
}

#[async_trait]
impl ProvingBackend for Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Arkworks(b) => b.name(),
            Backend::Snarkjs(b) => b.name(),
        }
    }

    async fn full_prove(&self, input: &CircuitInput) -> Result<RawProof, ProvingError> {
        match self {
            Backend::Arkworks(b) => b.full_prove(input).await,
            Backend::Snarkjs(b) => b.full_prove(input).await,
        }
    }
}

/// Drives a backend and returns verifier-ready arguments.
#[derive(Clone)]
pub struct ProofEngine {
    backend: Arc<dyn ProvingBackend>,
}

impl ProofEngine {
    pub fn new(backend: Arc<dyn ProvingBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn prove(&self, witness: &MembershipWitness) -> Result<ProofArtifact, ProvingError> {
        let input = witness.to_circuit_input();
        let raw = self.backend.full_prove(&input).await?;
        let artifact = ProofArtifact::from_raw(&raw)?;

        let expected = vec![
            normalize_integer_string(&witness.root).map_err(|e| ProvingError::MalformedOutput(e.to_string()))?,
            normalize_integer_string(&witness.nullifier_hash)
                .map_err(|e| ProvingError::MalformedOutput(e.to_string()))?,
        ];
        if !expected.iter().all(|v| artifact.public_inputs.contains(v)) {
            return Err(ProvingError::PublicSignalMismatch {
                expected,
                actual: artifact.public_inputs,
            });
        }

        info!(backend = self.backend.name(), "membership proof generated");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests;
