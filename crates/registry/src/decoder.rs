//! Registration event decoding.
//!
//! Turns raw logs into [`EventRecord`]s and fixes the global leaf order by
//! sorting on the contract-assigned registration index.

use alloy_primitives::{keccak256, U256};
use alloy_sol_types::SolEvent;
use ark_bn254::Fr;
use ballot_circuits::encoding::{fr_from_be_bytes, EncodingError};
use thiserror::Error;
use tracing::warn;

use crate::abi::Registered;
use crate::rpc::{decode_hex_data, parse_quantity, RawLog};

/// Default registration event emitted by the voting contract.
pub const DEFAULT_EVENT_SIGNATURE: &str = Registered::SIGNATURE;

const WORD: usize = 32;

/// keccak256 of a canonical event signature.
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes()).0
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log topic {actual:?} does not match registration event {expected}")]
    TopicMismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error("malformed {field}: {reason}")]
    MalformedWord { field: &'static str, reason: String },

    #[error("expected {expected} event words, got {actual}")]
    WordCount { expected: usize, actual: usize },

    #[error("registration index 0x{0} does not fit in 64 bits")]
    IndexOverflow(String),

    #[error("commitment 0x{0} is not a field element")]
    CommitmentOutOfField(String),

    #[error("registration index {0} appears more than once")]
    DuplicateIndex(u64),
}

/// One decoded registration event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub commitment: Fr,
    pub registration_index: u64,
    /// Diagnostics only.
    pub block_number: Option<u64>,
}

/// Commitments in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafSequence(Vec<Fr>);

impl LeafSequence {
    pub fn as_slice(&self) -> &[Fr] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Fr> {
        self.0
    }
}

impl From<Vec<Fr>> for LeafSequence {
    fn from(leaves: Vec<Fr>) -> Self {
        Self(leaves)
    }
}

/// Decoder for `Event(uint256 commitment, uint256 index)`-shaped logs.
///
/// topic0 is matched against the configured signature. The event words,
/// topics 1.. followed by the data words, are then decoded as the
/// [`Registered`] tuple, so the decoder works whether or not either
/// parameter is indexed.
#[derive(Debug, Clone)]
pub struct LeafDecoder {
    topic0: [u8; 32],
}

impl LeafDecoder {
    pub fn new(topic0: [u8; 32]) -> Self {
        Self { topic0 }
    }

    pub fn from_signature(signature: &str) -> Self {
        Self::new(event_topic(signature))
    }

    pub fn topic0(&self) -> [u8; 32] {
        self.topic0
    }

    pub fn decode_record(&self, log: &RawLog) -> Result<EventRecord, DecodeError> {
        let expected = format!("0x{}", hex::encode(self.topic0));
        let topic_matches = log
            .topics
            .first()
            .map(|t| t.eq_ignore_ascii_case(&expected))
            .unwrap_or(false);
        if !topic_matches {
            return Err(DecodeError::TopicMismatch {
                expected,
                actual: log.topics.first().cloned(),
            });
        }

        let mut words = Vec::with_capacity(2 * WORD);
        for topic in &log.topics[1..] {
            let bytes = decode_field("topic", topic)?;
            if bytes.len() != WORD {
                return Err(DecodeError::MalformedWord {
                    field: "topic",
                    reason: format!("{} bytes", bytes.len()),
                });
            }
            words.extend_from_slice(&bytes);
        }

        let data = decode_field("data", &log.data)?;
        if data.len() % WORD != 0 {
            return Err(DecodeError::MalformedWord {
                field: "data",
                reason: format!("length {} is not a multiple of {}", data.len(), WORD),
            });
        }
        words.extend_from_slice(&data);

        if words.len() != 2 * WORD {
            return Err(DecodeError::WordCount {
                expected: 2,
                actual: words.len() / WORD,
            });
        }

        let (commitment, index) =
            Registered::abi_decode_data(&words, true).map_err(|e| DecodeError::MalformedWord {
                field: "data",
                reason: e.to_string(),
            })?;

        let commitment_bytes = commitment.to_be_bytes::<WORD>();
        let commitment = fr_from_be_bytes(&commitment_bytes).map_err(|e| match e {
            EncodingError::OutOfField(_) => DecodeError::CommitmentOutOfField(hex::encode(commitment_bytes)),
            other => DecodeError::MalformedWord {
                field: "commitment",
                reason: other.to_string(),
            },
        })?;
        let registration_index = index_to_u64(index)?;
        let block_number = log.block_number.as_deref().and_then(|b| parse_quantity(b).ok());

        Ok(EventRecord {
            commitment,
            registration_index,
            block_number,
        })
    }

    /// Decode and sort by registration index. Duplicate indices are fatal.
    pub fn decode_records(&self, logs: &[RawLog]) -> Result<Vec<EventRecord>, DecodeError> {
        let mut records = logs
            .iter()
            .map(|log| self.decode_record(log))
            .collect::<Result<Vec<_>, _>>()?;

        records.sort_by_key(|r| r.registration_index);

        for pair in records.windows(2) {
            if pair[0].registration_index == pair[1].registration_index {
                return Err(DecodeError::DuplicateIndex(pair[1].registration_index));
            }
            if pair[1].registration_index != pair[0].registration_index + 1 {
                warn!(
                    after = pair[0].registration_index,
                    next = pair[1].registration_index,
                    "gap in registration indices"
                );
            }
        }

        Ok(records)
    }

    pub fn decode(&self, logs: &[RawLog]) -> Result<LeafSequence, DecodeError> {
        let records = self.decode_records(logs)?;
        Ok(LeafSequence(records.into_iter().map(|r| r.commitment).collect()))
    }
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, DecodeError> {
    decode_hex_data(value).map_err(|e| DecodeError::MalformedWord {
        field,
        reason: e.to_string(),
    })
}

fn index_to_u64(index: U256) -> Result<u64, DecodeError> {
    u64::try_from(index).map_err(|_| DecodeError::IndexOverflow(hex::encode(index.to_be_bytes::<WORD>())))
}
