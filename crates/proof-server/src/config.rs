//! Server configuration from environment variables.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ark_bn254::Fr;
use ballot_circuits::{fr_from_str, DEFAULT_TREE_DEPTH};
use ballot_prover::PipelineConfig;
use ballot_registry::{RetrieverConfig, DEFAULT_EVENT_SIGNATURE};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Arkworks,
    Snarkjs,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arkworks" => Ok(BackendKind::Arkworks),
            "snarkjs" => Ok(BackendKind::Snarkjs),
            other => Err(format!("unknown backend {other:?}, expected arkworks or snarkjs")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub rpc_url: String,
    pub contract_address: String,
    pub event_signature: String,
    pub start_block: u64,
    pub tree_depth: usize,
    pub zero_value: Fr,
    pub root_history: u64,
    /// Groth16 keys for arkworks, `voting/` circuit artifacts for snarkjs.
    pub keys_dir: PathBuf,
    pub backend: BackendKind,
    pub snarkjs_bin: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub rpc_timeout: Duration,
    pub pipeline_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `RPC_URL` and `CONTRACT_ADDRESS` are required.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| lookup(key).filter(|v| !v.is_empty()).ok_or(ConfigError::Missing(key));

        let zero_value = match lookup("ZERO_VALUE") {
            Some(v) => fr_from_str(&v).map_err(|e| ConfigError::Invalid {
                key: "ZERO_VALUE",
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => Fr::from(0u64),
        };

        let tree_depth: usize = parse_or(&lookup, "TREE_DEPTH", DEFAULT_TREE_DEPTH)?;
        if !(1..=32).contains(&tree_depth) {
            return Err(ConfigError::Invalid {
                key: "TREE_DEPTH",
                value: tree_depth.to_string(),
                reason: "must be between 1 and 32".into(),
            });
        }

        Ok(Self {
            rpc_url: required("RPC_URL")?,
            contract_address: required("CONTRACT_ADDRESS")?,
            event_signature: lookup("EVENT_SIGNATURE").unwrap_or_else(|| DEFAULT_EVENT_SIGNATURE.to_string()),
            start_block: parse_or(&lookup, "START_BLOCK", 0)?,
            tree_depth,
            zero_value,
            root_history: parse_or(&lookup, "ROOT_HISTORY", 3)?,
            keys_dir: lookup("KEYS_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("keys")),
            backend: parse_or(&lookup, "PROVER_BACKEND", BackendKind::Arkworks)?,
            snarkjs_bin: lookup("SNARKJS_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("snarkjs")),
            host: parse_or(&lookup, "HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or(&lookup, "PORT", 3001)?,
            rpc_timeout: Duration::from_secs(parse_or(&lookup, "RPC_TIMEOUT_SECS", 30)?),
            pipeline_timeout: Duration::from_secs(parse_or(&lookup, "PIPELINE_TIMEOUT_SECS", 120)?),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            tree_depth: self.tree_depth,
            zero_value: self.zero_value,
            start_block: self.start_block,
            root_history: self.root_history,
            timeout: self.pipeline_timeout,
            ..PipelineConfig::default()
        }
    }

    pub fn retriever_config(&self) -> RetrieverConfig {
        RetrieverConfig {
            request_timeout: self.rpc_timeout,
            ..RetrieverConfig::default()
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
