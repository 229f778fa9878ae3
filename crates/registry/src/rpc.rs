//! JSON-RPC adapter for the chain endpoint.
//!
//! Provider failures are classified here, once, into [`RpcError`] so the
//! retriever can dispatch on a typed kind instead of message text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::trace;

/// Error code several providers attach to "limit exceeded" rejections.
pub const LIMIT_EXCEEDED_CODE: i64 = -32005;

const PAYLOAD_TOO_LARGE: u16 = 413;

/// Lower-cased fragments of known result-size rejections.
const SIZE_LIMIT_MARKERS: &[&str] = &[
    "log response size exceeded",
    "query returned more than",
    "block range is too wide",
    "block range too large",
    "exceed maximum block range",
    "response size should not greater than",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("provider rejected the query as too large: {0}")]
    ResponseTooLarge(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Map a provider error onto an [`RpcError`] kind.
pub fn classify_rpc_error(code: i64, message: &str) -> RpcError {
    let lower = message.to_ascii_lowercase();
    if code == LIMIT_EXCEEDED_CODE || SIZE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
        RpcError::ResponseTooLarge(message.to_string())
    } else {
        RpcError::Rpc {
            code,
            message: message.to_string(),
        }
    }
}

/// Map a non-2xx response without a JSON-RPC error object onto an
/// [`RpcError`] kind. The body may be plain text or a `{"message": ..}`
/// object.
pub fn classify_http_error(status: u16, body: &str) -> RpcError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    let message = if message.is_empty() {
        format!("HTTP {status}")
    } else {
        message
    };

    if status == PAYLOAD_TOO_LARGE {
        return RpcError::ResponseTooLarge(message);
    }
    classify_rpc_error(i64::from(status), &message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Number(u64),
    Latest,
}

impl BlockTag {
    pub fn to_rpc(self) -> String {
        match self {
            BlockTag::Number(n) => format!("{:#x}", n),
            BlockTag::Latest => "latest".to_string(),
        }
    }
}

/// An `eth_getLogs` query for one event on one contract over an inclusive
/// block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: String,
    pub topic0: [u8; 32],
    pub from_block: u64,
    pub to_block: u64,
}

impl LogFilter {
    pub fn to_params(&self) -> Value {
        json!([{
            "address": self.address,
            "topics": [format!("0x{}", hex::encode(self.topic0))],
            "fromBlock": BlockTag::Number(self.from_block).to_rpc(),
            "toBlock": BlockTag::Number(self.to_block).to_rpc(),
        }])
    }
}

/// A log entry as returned by the node, still hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub log_index: Option<String>,
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(s: &str) -> Result<u64, RpcError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::InvalidResponse(format!("quantity without 0x prefix: {s}")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("bad quantity {s}: {e}")))
}

/// Decode `0x`-prefixed hex data.
pub fn decode_hex_data(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

/// The subset of Ethereum JSON-RPC the registry needs.
///
/// Implementations MUST report size-limit rejections as
/// [`RpcError::ResponseTooLarge`] and MUST NOT retry internally.
#[async_trait]
pub trait EthRpc: Send + Sync {
    async fn block_number(&self) -> Result<u64, RpcError>;

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError>;

    /// `eth_call` against the latest block, returning the raw return data.
    async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, RpcError>;
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC 2.0 client.
pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(method, id, "rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        match serde_json::from_str::<RpcResponse<T>>(&text) {
            Ok(RpcResponse {
                error: Some(err), ..
            }) => Err(classify_rpc_error(err.code, &err.message)),
            Ok(RpcResponse {
                result: Some(result),
                ..
            }) if status.is_success() => Ok(result),
            // Some providers answer size rejections with a bare HTTP error
            _ if !status.is_success() => Err(classify_http_error(status.as_u16(), &text)),
            Ok(_) => Err(RpcError::InvalidResponse(format!("{method}: missing result"))),
            Err(e) => Err(RpcError::InvalidResponse(e.to_string())),
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> RpcError {
        if e.is_timeout() {
            RpcError::Timeout(self.timeout)
        } else {
            RpcError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl EthRpc for JsonRpcClient {
    async fn block_number(&self) -> Result<u64, RpcError> {
        let quantity: String = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&quantity)
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError> {
        self.request("eth_getLogs", filter.to_params()).await
    }

    async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        let params = json!([
            { "to": to, "data": format!("0x{}", hex::encode(data)) },
            "latest",
        ]);
        let result: String = self.request("eth_call", params).await?;
        decode_hex_data(&result).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_size_limits() {
        for message in [
            "Log response size exceeded. You can make eth_getLogs requests with up to a 2K block range",
            "query returned more than 10000 results",
            "eth_getLogs block range is too wide",
        ] {
            assert!(
                matches!(classify_rpc_error(-32000, message), RpcError::ResponseTooLarge(_)),
                "{message}"
            );
        }
        assert!(matches!(
            classify_rpc_error(LIMIT_EXCEEDED_CODE, "limit exceeded"),
            RpcError::ResponseTooLarge(_)
        ));
    }

    #[test]
    fn test_classify_other_errors() {
        assert_eq!(
            classify_rpc_error(-32602, "invalid params"),
            RpcError::Rpc {
                code: -32602,
                message: "invalid params".to_string()
            }
        );
    }

    #[test]
    fn test_classify_http_errors() {
        assert_eq!(
            classify_http_error(413, r#"{"message":"Log response size exceeded"}"#),
            RpcError::ResponseTooLarge("Log response size exceeded".to_string())
        );
        assert_eq!(
            classify_http_error(413, ""),
            RpcError::ResponseTooLarge("HTTP 413".to_string())
        );
        assert!(matches!(
            classify_http_error(400, "query returned more than 10000 results"),
            RpcError::ResponseTooLarge(_)
        ));
        assert_eq!(
            classify_http_error(502, "  bad gateway\n"),
            RpcError::Rpc {
                code: 502,
                message: "bad gateway".to_string()
            }
        );
    }

    #[test]
    fn test_block_tags() {
        assert_eq!(BlockTag::Number(3595561).to_rpc(), "0x36dd29");
        assert_eq!(BlockTag::Number(0).to_rpc(), "0x0");
        assert_eq!(BlockTag::Latest.to_rpc(), "latest");
    }

    #[test]
    fn test_log_filter_params() {
        let filter = LogFilter {
            address: "0x00000000000000000000000000000000000000aa".to_string(),
            topic0: [0x11; 32],
            from_block: 16,
            to_block: 255,
        };
        let params = filter.to_params();

        assert_eq!(params[0]["fromBlock"], "0x10");
        assert_eq!(params[0]["toBlock"], "0xff");
        assert_eq!(params[0]["topics"][0], format!("0x{}", "11".repeat(32)));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert!(matches!(parse_quantity("1b4"), Err(RpcError::InvalidResponse(_))));
        assert!(matches!(parse_quantity("0xzz"), Err(RpcError::InvalidResponse(_))));
    }

    #[test]
    fn test_raw_log_deserializes_node_shape() {
        let log: RawLog = serde_json::from_value(json!({
            "address": "0xabc",
            "topics": ["0x01"],
            "data": "0x",
            "blockNumber": "0x10",
            "transactionHash": "0xdead",
            "logIndex": "0x0",
            "removed": false
        }))
        .unwrap();

        assert_eq!(log.block_number.as_deref(), Some("0x10"));
        assert_eq!(log.topics.len(), 1);
    }

    // ════════════════════════════════════════════════════════════════════
    // JsonRpcClient against a mock HTTP endpoint
    // ════════════════════════════════════════════════════════════════════

    mod client {
        use super::*;
        use wiremock::matchers::{body_partial_json, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn client(server: &MockServer) -> JsonRpcClient {
            JsonRpcClient::new(server.uri(), Duration::from_secs(5)).unwrap()
        }

        fn filter() -> LogFilter {
            LogFilter {
                address: "0x000000000000000000000000000000000000c0de".to_string(),
                topic0: [0x22; 32],
                from_block: 0,
                to_block: 99,
            }
        }

        async fn respond(server: &MockServer, template: ResponseTemplate) {
            Mock::given(method("POST"))
                .respond_with(template)
                .mount(server)
                .await;
        }

        fn rpc_error(code: i64, message: &str) -> Value {
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": code, "message": message}})
        }

        fn rpc_result(result: Value) -> Value {
            json!({"jsonrpc": "2.0", "id": 1, "result": result})
        }

        #[tokio::test]
        async fn test_limit_exceeded_envelope_is_too_large() {
            let server = MockServer::start().await;
            respond(
                &server,
                ResponseTemplate::new(200).set_body_json(rpc_error(-32005, "limit exceeded")),
            )
            .await;

            let err = client(&server).get_logs(&filter()).await.unwrap_err();
            assert_eq!(err, RpcError::ResponseTooLarge("limit exceeded".to_string()));
        }

        #[tokio::test]
        async fn test_error_envelope_wins_over_http_status() {
            let server = MockServer::start().await;
            respond(
                &server,
                ResponseTemplate::new(500).set_body_json(rpc_error(-32000, "header not found")),
            )
            .await;

            let err = client(&server).get_logs(&filter()).await.unwrap_err();
            assert_eq!(
                err,
                RpcError::Rpc {
                    code: -32000,
                    message: "header not found".to_string()
                }
            );
        }

        #[tokio::test]
        async fn test_payload_too_large_json_body_is_too_large() {
            let server = MockServer::start().await;
            respond(
                &server,
                ResponseTemplate::new(413).set_body_json(json!({"message": "Log response size exceeded"})),
            )
            .await;

            let err = client(&server).get_logs(&filter()).await.unwrap_err();
            assert_eq!(err, RpcError::ResponseTooLarge("Log response size exceeded".to_string()));
        }

        #[tokio::test]
        async fn test_non_2xx_text_body_is_classified() {
            let server = MockServer::start().await;
            respond(&server, ResponseTemplate::new(503).set_body_string("upstream unavailable")).await;

            let err = client(&server).block_number().await.unwrap_err();
            assert_eq!(
                err,
                RpcError::Rpc {
                    code: 503,
                    message: "upstream unavailable".to_string()
                }
            );
        }

        #[tokio::test]
        async fn test_non_2xx_size_marker_is_too_large() {
            let server = MockServer::start().await;
            respond(
                &server,
                ResponseTemplate::new(400).set_body_string("query returned more than 10000 results"),
            )
            .await;

            let err = client(&server).get_logs(&filter()).await.unwrap_err();
            assert!(matches!(err, RpcError::ResponseTooLarge(_)), "{err}");
        }

        #[tokio::test]
        async fn test_missing_result_is_invalid() {
            let server = MockServer::start().await;
            respond(
                &server,
                ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1})),
            )
            .await;

            let err = client(&server).block_number().await.unwrap_err();
            assert_eq!(
                err,
                RpcError::InvalidResponse("eth_blockNumber: missing result".to_string())
            );
        }

        #[tokio::test]
        async fn test_non_json_success_is_invalid() {
            let server = MockServer::start().await;
            respond(&server, ResponseTemplate::new(200).set_body_string("<html>")).await;

            let err = client(&server).block_number().await.unwrap_err();
            assert!(matches!(err, RpcError::InvalidResponse(_)), "{err}");
        }

        #[tokio::test]
        async fn test_block_number() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(body_partial_json(json!({"method": "eth_blockNumber"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!("0x1b4"))))
                .mount(&server)
                .await;

            assert_eq!(client(&server).block_number().await.unwrap(), 436);
        }

        #[tokio::test]
        async fn test_get_logs_sends_filter() {
            let server = MockServer::start().await;
            let log = json!({
                "address": "0x000000000000000000000000000000000000c0de",
                "topics": [format!("0x{}", "22".repeat(32))],
                "data": "0x",
                "blockNumber": "0x5"
            });
            Mock::given(method("POST"))
                .and(body_partial_json(json!({
                    "jsonrpc": "2.0",
                    "method": "eth_getLogs",
                    "params": [{"fromBlock": "0x0", "toBlock": "0x63"}]
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!([log]))))
                .expect(1)
                .mount(&server)
                .await;

            let logs = client(&server).get_logs(&filter()).await.unwrap();
            assert_eq!(logs.len(), 1);
            assert_eq!(logs[0].block_number.as_deref(), Some("0x5"));
        }

        #[tokio::test]
        async fn test_eth_call_decodes_hex() {
            let server = MockServer::start().await;
            let word = format!("0x{}2a", "00".repeat(31));
            Mock::given(method("POST"))
                .and(body_partial_json(json!({
                    "method": "eth_call",
                    "params": [{"to": "0x000000000000000000000000000000000000c0de", "data": "0x5ca1ab1e"}, "latest"]
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!(word))))
                .mount(&server)
                .await;

            let data = client(&server)
                .call("0x000000000000000000000000000000000000c0de", &[0x5c, 0xa1, 0xab, 0x1e])
                .await
                .unwrap();
            assert_eq!(data.len(), 32);
            assert_eq!(data[31], 0x2a);
        }

        #[tokio::test]
        async fn test_eth_call_bad_hex_is_invalid() {
            let server = MockServer::start().await;
            respond(&server, ResponseTemplate::new(200).set_body_json(rpc_result(json!("0xzz")))).await;

            let err = client(&server).call("0xc0de", &[]).await.unwrap_err();
            assert!(matches!(err, RpcError::InvalidResponse(_)), "{err}");
        }

        #[tokio::test]
        async fn test_slow_endpoint_times_out() {
            let server = MockServer::start().await;
            respond(
                &server,
                ResponseTemplate::new(200)
                    .set_body_json(rpc_result(json!("0x1")))
                    .set_delay(Duration::from_millis(500)),
            )
            .await;

            let timeout = Duration::from_millis(50);
            let client = JsonRpcClient::new(server.uri(), timeout).unwrap();
            assert_eq!(client.block_number().await.unwrap_err(), RpcError::Timeout(timeout));
        }
    }
}
