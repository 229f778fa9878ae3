//! End-to-end ballot proof pipeline.
//!
//! retrieve registration logs -> decode leaves -> rebuild the tree ->
//! check the root against the contract -> witness -> proof.

use std::sync::Arc;
use std::time::Duration;

use ark_bn254::Fr;
use ark_ff::Zero;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, instrument, warn};

use ballot_circuits::encoding::{normalize_integer_string, EncodingError};
use ballot_circuits::{
    fr_to_decimal, IncrementalMerkleTree, PoseidonError, PoseidonHasher, TreeError, DEFAULT_TREE_DEPTH,
};
use ballot_registry::{
    BlockTag, ContractError, DecodeError, EthRpc, LeafDecoder, LogRetriever, RegistryContract,
    RetrievalError, RetrieverConfig,
};

use crate::calldata::ProofArtifact;
use crate::prove::{ProofEngine, ProvingError};
use crate::witness::{WitnessAssembler, WitnessError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Witness(#[from] WitnessError),
    #[error(transparent)]
    Proving(#[from] ProvingError),
    #[error(transparent)]
    Poseidon(#[from] PoseidonError),
    #[error("Invalid input: {0}")]
    Encoding(#[from] EncodingError),
    #[error("Local root {root} not accepted by the registry after {attempts} attempts")]
    StaleRegistry { root: String, attempts: u32 },
    #[error("Pipeline timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub tree_depth: usize,
    pub zero_value: Fr,
    /// First block scanned for registrations (contract deployment).
    pub start_block: u64,
    /// Entries of the contract's `roots(i)` window accepted besides `getRoot()`.
    pub root_history: u64,
    /// Re-fetches after the first rebuild when the root is not accepted.
    pub max_stale_retries: u32,
    pub timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tree_depth: DEFAULT_TREE_DEPTH,
            zero_value: Fr::zero(),
            start_block: 0,
            root_history: 3,
            max_stale_retries: 2,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Arguments for `vote(contestantId, a, b, c, input)`, handed to whatever
/// submits the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCall {
    pub contract: String,
    pub contestant_id: String,
    pub proof: ProofArtifact,
}

impl VoteCall {
    /// `[contestantId, a, b, c, input]`
    pub fn to_args(&self) -> Value {
        json!([
            self.contestant_id,
            self.proof.a,
            self.proof.b,
            self.proof.c,
            self.proof.public_inputs
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub root: String,
    pub leaf_count: usize,
    pub accepted_roots: Vec<String>,
    pub in_sync: bool,
}

pub struct BallotPipeline {
    retriever: LogRetriever,
    decoder: LeafDecoder,
    contract: RegistryContract,
    hasher: PoseidonHasher,
    assembler: WitnessAssembler,
    engine: ProofEngine,
    config: PipelineConfig,
}

impl BallotPipeline {
    pub fn new(
        rpc: Arc<dyn EthRpc>,
        contract_address: impl Into<String>,
        event_signature: &str,
        retriever_config: RetrieverConfig,
        engine: ProofEngine,
        hasher: PoseidonHasher,
        config: PipelineConfig,
    ) -> Self {
        let address = contract_address.into();
        let contract = RegistryContract::new(rpc.clone(), address.clone(), event_signature);
        let topic0 = contract.registered_topic();

        Self {
            retriever: LogRetriever::new(rpc, address, topic0, retriever_config),
            decoder: LeafDecoder::new(topic0),
            contract,
            assembler: WitnessAssembler::new(hasher.clone()),
            hasher,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn contract(&self) -> &RegistryContract {
        &self.contract
    }

    pub fn engine(&self) -> &ProofEngine {
        &self.engine
    }

    /// Fetch every registration up to the chain head and rebuild the tree.
    pub async fn rebuild(&self) -> Result<IncrementalMerkleTree, PipelineError> {
        let logs = self
            .retriever
            .fetch_events(BlockTag::Number(self.config.start_block), BlockTag::Latest)
            .await?;
        let leaves = self.decoder.decode(&logs)?;

        let tree = IncrementalMerkleTree::build(
            self.config.tree_depth,
            self.config.zero_value,
            self.hasher.clone(),
            leaves.as_slice(),
        )?;
        info!(leaves = tree.len(), root = %fr_to_decimal(&tree.root()), "registry tree rebuilt");
        Ok(tree)
    }

    /// Rebuild until the local root is one the contract accepts.
    async fn synced_tree(&self) -> Result<IncrementalMerkleTree, PipelineError> {
        let attempts = self.config.max_stale_retries + 1;
        let mut last_root = Fr::zero();

        for attempt in 1..=attempts {
            let tree = self.rebuild().await?;
            let accepted = self.contract.accepted_roots(self.config.root_history).await?;
            if accepted.contains(&tree.root()) {
                return Ok(tree);
            }

            last_root = tree.root();
            warn!(
                attempt,
                root = %fr_to_decimal(&last_root),
                "local root not accepted by the registry, refetching"
            );
            if attempt < attempts {
                tokio::time::sleep(self.retriever.config().backoff).await;
            }
        }

        Err(PipelineError::StaleRegistry {
            root: fr_to_decimal(&last_root),
            attempts,
        })
    }

    async fn prove_inner(&self, secret: Fr, nullifier: Fr) -> Result<ProofArtifact, PipelineError> {
        let tree = self.synced_tree().await?;

        let commitment = self.assembler.commitment(secret, nullifier);
        let index = tree.locate(&commitment)?;
        info!(index, "commitment located");

        let witness = self.assembler.assemble(secret, nullifier, &tree, index)?;
        let artifact = self.engine.prove(&witness).await?;
        Ok(artifact)
    }

    #[instrument(skip_all, fields(backend = self.engine.backend_name()))]
    pub async fn prove_membership(&self, secret: Fr, nullifier: Fr) -> Result<ProofArtifact, PipelineError> {
        tokio::time::timeout(self.config.timeout, self.prove_inner(secret, nullifier))
            .await
            .map_err(|_| PipelineError::Timeout(self.config.timeout))?
    }

    #[instrument(skip(self, secret, nullifier))]
    pub async fn prepare_vote(
        &self,
        secret: Fr,
        nullifier: Fr,
        contestant_id: &str,
    ) -> Result<VoteCall, PipelineError> {
        let contestant_id = normalize_integer_string(contestant_id)?;
        let proof = self.prove_membership(secret, nullifier).await?;

        info!("vote call prepared");
        Ok(VoteCall {
            contract: self.contract.address().to_string(),
            contestant_id,
            proof,
        })
    }

    /// One rebuild compared against the accepted roots, without retrying.
    #[instrument(skip_all)]
    pub async fn registry_snapshot(&self) -> Result<RegistrySnapshot, PipelineError> {
        let snapshot = async {
            let tree = self.rebuild().await?;
            let accepted = self.contract.accepted_roots(self.config.root_history).await?;
            Ok::<_, PipelineError>(RegistrySnapshot {
                root: fr_to_decimal(&tree.root()),
                leaf_count: tree.len(),
                in_sync: accepted.contains(&tree.root()),
                accepted_roots: accepted.iter().map(fr_to_decimal).collect(),
            })
        };

        tokio::time::timeout(self.config.timeout, snapshot)
            .await
            .map_err(|_| PipelineError::Timeout(self.config.timeout))?
    }
}
