//! Ballot membership proofs.
//!
//! This crate provides utilities for:
//! - Trusted setup (generating proving and verifying keys)
//! - Witness assembly against a rebuilt voter registry
//! - Proof generation (in-process Groth16 or snarkjs) and verifier calldata
//! - Local proof verification
//! - The end-to-end pipeline from chain logs to a vote call

pub mod calldata;
pub mod pipeline;
pub mod prove;
pub mod setup;
pub mod verify;
pub mod witness;

pub use calldata::{CalldataError, ProofArtifact};
pub use pipeline::{BallotPipeline, PipelineConfig, PipelineError, RegistrySnapshot, VoteCall};
pub use prove::{
    ArkworksBackend, Backend, ProofEngine, ProvingBackend, ProvingError, RawProof, SnarkjsBackend,
    SnarkjsProof,
};
pub use setup::{setup_all_circuits, CircuitKeyPair, CircuitKeys, SetupError};
pub use verify::{verify_artifact, verify_membership, VerifyError};
pub use witness::{CircuitInput, MembershipWitness, WitnessAssembler, WitnessError};
