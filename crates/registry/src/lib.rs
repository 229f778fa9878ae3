//! Voter registry retrieval.
//!
//! Everything between the chain and the tree builder:
//! - `rpc`: JSON-RPC adapter with typed provider-error classification
//! - `retriever`: `LogRetriever`, range-bisecting `eth_getLogs`
//! - `decoder`: `LeafDecoder`, raw logs to commitments in registration order
//! - `abi`: Solidity interface of the registry (event and view calls)
//! - `contract`: accepted-root window of the voting contract

pub mod abi;
pub mod contract;
pub mod decoder;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod retriever;
pub mod rpc;

pub use contract::{ContractError, RegistryContract};
pub use decoder::{event_topic, DecodeError, EventRecord, LeafDecoder, LeafSequence, DEFAULT_EVENT_SIGNATURE};
pub use retriever::{LogRetriever, RetrievalError, RetrieverConfig};
pub use rpc::{classify_http_error, classify_rpc_error, BlockTag, EthRpc, JsonRpcClient, LogFilter, RawLog, RpcError};
