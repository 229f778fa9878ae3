//! Range-bisecting log retrieval.
//!
//! A single `eth_getLogs` over the whole registry lifetime is the happy
//! path. When the provider refuses the response size, the range is split
//! at its midpoint into two disjoint inclusive halves that are fetched
//! concurrently, after a short back-off. Records come back in no
//! particular order; the decoder restores registration order.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::rpc::{BlockTag, EthRpc, LogFilter, RawLog, RpcError};

type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<RawLog>, RetrievalError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieverConfig {
    /// Pause before re-issuing a rejected range as two halves.
    pub backoff: Duration,
    /// Ranges this many blocks wide (or narrower) are never split.
    pub min_range: u64,
    /// Maximum bisection depth below the initial range.
    pub max_split_depth: u32,
    /// Deadline for each individual `eth_getLogs` call.
    pub request_timeout: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(500),
            min_range: 1,
            max_split_depth: 32,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("blocks {from}..={to} exceed provider limits and cannot be split further")]
    RangeNotSplittable { from: u64, to: u64 },

    #[error("split budget of {max_depth} levels exhausted at blocks {from}..={to}")]
    SplitBudgetExhausted { from: u64, to: u64, max_depth: u32 },

    #[error("invalid block range: {from} is after {to}")]
    InvalidRange { from: u64, to: u64 },

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Fetches every registration log emitted by one contract.
pub struct LogRetriever {
    rpc: Arc<dyn EthRpc>,
    address: String,
    topic0: [u8; 32],
    config: RetrieverConfig,
}

impl LogRetriever {
    pub fn new(
        rpc: Arc<dyn EthRpc>,
        address: impl Into<String>,
        topic0: [u8; 32],
        config: RetrieverConfig,
    ) -> Self {
        Self {
            rpc,
            address: address.into(),
            topic0,
            config,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// All matching logs in `from..=to`, in arbitrary order.
    ///
    /// `Latest` is resolved once, before any splitting, so every sub-range
    /// refers to the same chain head.
    #[instrument(skip(self), fields(address = %self.address))]
    pub async fn fetch_events(&self, from: BlockTag, to: BlockTag) -> Result<Vec<RawLog>, RetrievalError> {
        let head = match (from, to) {
            (BlockTag::Latest, _) | (_, BlockTag::Latest) => Some(self.rpc.block_number().await?),
            _ => None,
        };
        let resolve = |tag: BlockTag| match tag {
            BlockTag::Number(n) => n,
            BlockTag::Latest => head.unwrap_or_default(),
        };
        let (from, to) = (resolve(from), resolve(to));

        if from > to {
            return Err(RetrievalError::InvalidRange { from, to });
        }

        let logs = self.fetch_range(from, to, 0).await?;
        debug!(from, to, count = logs.len(), "registration logs retrieved");
        Ok(logs)
    }

    fn fetch_range(&self, from: u64, to: u64, depth: u32) -> FetchFuture<'_> {
        Box::pin(async move {
            let filter = LogFilter {
                address: self.address.clone(),
                topic0: self.topic0,
                from_block: from,
                to_block: to,
            };
            debug!(from, to, depth, "eth_getLogs");

            let result = tokio::time::timeout(self.config.request_timeout, self.rpc.get_logs(&filter))
                .await
                .unwrap_or(Err(RpcError::Timeout(self.config.request_timeout)));

            let reason = match result {
                Ok(logs) => return Ok(logs),
                Err(RpcError::ResponseTooLarge(reason)) => reason,
                Err(e) => return Err(e.into()),
            };

            // `to - from` is the width minus one, so this holds over the full u64 range.
            if to - from < self.config.min_range.max(1) {
                return Err(RetrievalError::RangeNotSplittable { from, to });
            }
            if depth >= self.config.max_split_depth {
                return Err(RetrievalError::SplitBudgetExhausted {
                    from,
                    to,
                    max_depth: self.config.max_split_depth,
                });
            }

            warn!(from, to, depth, %reason, "log response too large, bisecting");
            tokio::time::sleep(self.config.backoff).await;

            let mid = from + (to - from) / 2;
            let (mut lower, upper) = tokio::try_join!(
                self.fetch_range(from, mid, depth + 1),
                self.fetch_range(mid + 1, to, depth + 1),
            )?;
            lower.extend(upper);
            Ok(lower)
        })
    }
}
