//! Read-only view of the voting contract's registry.

use std::sync::Arc;

use alloy_primitives::U256;
use alloy_sol_types::SolCall;
use ark_bn254::Fr;
use ballot_circuits::encoding::fr_from_be_bytes;
use thiserror::Error;
use tracing::debug;

use crate::abi::{getRootCall, rootsCall};
use crate::decoder::event_topic;
use crate::rpc::{EthRpc, RpcError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("{call} returned malformed data: {reason}")]
    InvalidReturn { call: &'static str, reason: String },
}

pub struct RegistryContract {
    rpc: Arc<dyn EthRpc>,
    address: String,
    event_signature: String,
}

impl RegistryContract {
    pub fn new(rpc: Arc<dyn EthRpc>, address: impl Into<String>, event_signature: impl Into<String>) -> Self {
        Self {
            rpc,
            address: address.into(),
            event_signature: event_signature.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn event_signature(&self) -> &str {
        &self.event_signature
    }

    /// topic0 of the registration event.
    pub fn registered_topic(&self) -> [u8; 32] {
        event_topic(&self.event_signature)
    }

    /// The registry's latest root.
    pub async fn current_root(&self) -> Result<Fr, ContractError> {
        let data = self.rpc.call(&self.address, &getRootCall {}.abi_encode()).await?;
        let root = getRootCall::abi_decode_returns(&data, false)
            .map_err(|e| invalid_return("getRoot", e))?
            .root;
        root_to_fr("getRoot", root)
    }

    /// Entry `index` of the contract's rolling root history.
    pub async fn root_at(&self, index: u64) -> Result<Fr, ContractError> {
        let call = rootsCall {
            index: U256::from(index),
        };
        let data = self.rpc.call(&self.address, &call.abi_encode()).await?;
        let root = rootsCall::abi_decode_returns(&data, false)
            .map_err(|e| invalid_return("roots", e))?
            .root;
        root_to_fr("roots", root)
    }

    /// Current root followed by the first `history` entries of the root
    /// history, duplicates removed.
    pub async fn accepted_roots(&self, history: u64) -> Result<Vec<Fr>, ContractError> {
        let mut roots = vec![self.current_root().await?];
        for i in 0..history {
            let root = self.root_at(i).await?;
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        debug!(count = roots.len(), "accepted roots");
        Ok(roots)
    }
}

fn invalid_return(call: &'static str, e: alloy_sol_types::Error) -> ContractError {
    ContractError::InvalidReturn {
        call,
        reason: e.to_string(),
    }
}

fn root_to_fr(call: &'static str, root: U256) -> Result<Fr, ContractError> {
    fr_from_be_bytes(&root.to_be_bytes::<32>()).map_err(|e| ContractError::InvalidReturn {
        call,
        reason: e.to_string(),
    })
}
