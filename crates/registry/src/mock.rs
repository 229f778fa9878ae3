//! In-memory [`EthRpc`] for tests, without a node.
//!
//! Holds a list of registration logs, a chain head and the contract's
//! root history. `get_logs` refuses any range holding more than
//! `max_results` logs the way hosted providers do, so range bisection can
//! be exercised deterministically.

use std::sync::Mutex;

use alloy_primitives::U256;
use alloy_sol_types::{SolCall, SolEvent, SolValue};
use ark_bn254::Fr;
use async_trait::async_trait;
use ballot_circuits::encoding::fr_to_be_bytes;

use crate::abi::{getRootCall, rootsCall, Registered};
use crate::rpc::{parse_quantity, BlockTag, EthRpc, LogFilter, RawLog, RpcError};

/// Address every mock log claims to come from.
pub const MOCK_CONTRACT: &str = "0x000000000000000000000000000000000000c0de";

fn fr_to_u256(f: &Fr) -> U256 {
    U256::from_be_bytes(fr_to_be_bytes(f))
}

/// Build a registration log with both parameters in the data section.
pub fn registration_log(topic0: [u8; 32], commitment: Fr, index: u64, block: u64) -> RawLog {
    let event = Registered {
        commitment: fr_to_u256(&commitment),
        index: U256::from(index),
    };
    let data = event.encode_data();

    RawLog {
        address: MOCK_CONTRACT.to_string(),
        topics: vec![format!("0x{}", hex::encode(topic0))],
        data: format!("0x{}", hex::encode(data)),
        block_number: Some(BlockTag::Number(block).to_rpc()),
        transaction_hash: None,
        log_index: None,
    }
}

#[derive(Default)]
struct MockState {
    head: u64,
    logs: Vec<RawLog>,
    max_results: Option<usize>,
    current_root: Fr,
    root_history: Vec<Fr>,
    raw_call_response: Option<Vec<u8>>,
    queued_failures: Vec<RpcError>,
    queries: Vec<(u64, u64)>,
}

pub struct MockRpc {
    topic0: [u8; 32],
    state: Mutex<MockState>,
}

impl MockRpc {
    pub fn new(topic0: [u8; 32], head: u64) -> Self {
        Self {
            topic0,
            state: Mutex::new(MockState {
                head,
                ..MockState::default()
            }),
        }
    }

    /// Reject any `get_logs` range holding more than `limit` logs.
    pub fn with_max_results(self, limit: usize) -> Self {
        self.update(|s| s.max_results = Some(limit));
        self
    }

    pub fn push_registration(&self, commitment: Fr, index: u64, block: u64) {
        let log = registration_log(self.topic0, commitment, index, block);
        self.update(|s| s.logs.push(log));
    }

    pub fn push_log(&self, log: RawLog) {
        self.update(|s| s.logs.push(log));
    }

    pub fn set_head(&self, head: u64) {
        self.update(|s| s.head = head);
    }

    pub fn set_current_root(&self, root: Fr) {
        self.update(|s| s.current_root = root);
    }

    pub fn set_root_history(&self, roots: Vec<Fr>) {
        self.update(|s| s.root_history = roots);
    }

    /// Answer every `eth_call` with these bytes instead of the root tables.
    pub fn set_raw_call_response(&self, data: Vec<u8>) {
        self.update(|s| s.raw_call_response = Some(data));
    }

    /// The next `get_logs` call fails with `error`, FIFO.
    pub fn fail_next(&self, error: RpcError) {
        self.update(|s| s.queued_failures.push(error));
    }

    /// Every `(from, to)` range passed to `get_logs`, in call order.
    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.state
            .lock()
            .map(|s| s.queries.clone())
            .unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut MockState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockState>, RpcError> {
        self.state
            .lock()
            .map_err(|e| RpcError::Transport(format!("mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl EthRpc for MockRpc {
    async fn block_number(&self) -> Result<u64, RpcError> {
        Ok(self.lock()?.head)
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError> {
        let mut state = self.lock()?;
        state.queries.push((filter.from_block, filter.to_block));

        if !state.queued_failures.is_empty() {
            return Err(state.queued_failures.remove(0));
        }

        let topic = format!("0x{}", hex::encode(filter.topic0));
        let mut matched = Vec::new();
        for log in &state.logs {
            let block = match log.block_number.as_deref() {
                Some(b) => parse_quantity(b)?,
                None => continue,
            };
            let in_range = block >= filter.from_block && block <= filter.to_block;
            if in_range && log.topics.first() == Some(&topic) {
                matched.push(log.clone());
            }
        }

        match state.max_results {
            Some(limit) if matched.len() > limit => Err(RpcError::ResponseTooLarge(format!(
                "query returned more than {} results",
                limit
            ))),
            _ => Ok(matched),
        }
    }

    async fn call(&self, _to: &str, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        let state = self.lock()?;
        if let Some(raw) = &state.raw_call_response {
            return Ok(raw.clone());
        }

        if data.starts_with(&getRootCall::SELECTOR) {
            return Ok(fr_to_u256(&state.current_root).abi_encode());
        }
        if let Ok(call) = rootsCall::abi_decode(data, true) {
            let root = u64::try_from(call.index)
                .ok()
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| state.root_history.get(i).copied())
                .unwrap_or_default();
            return Ok(fr_to_u256(&root).abi_encode());
        }

        Err(RpcError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
        })
    }
}
