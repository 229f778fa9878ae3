//! HTTP request handlers for ballot proofs.

use std::sync::Arc;

use ark_bn254::Fr;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ballot_circuits::{fr_from_str, TreeError};
use ballot_prover::{PipelineError, ProofArtifact, RegistrySnapshot, VoteCall};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        backend: state.pipeline.engine().backend_name(),
    })
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(e) => match e {
                PipelineError::Encoding(_) => StatusCode::BAD_REQUEST,
                PipelineError::Tree(TreeError::NotFound { .. }) => StatusCode::NOT_FOUND,
                PipelineError::StaleRegistry { .. } => StatusCode::CONFLICT,
                PipelineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                PipelineError::Retrieval(_) | PipelineError::Decode(_) | PipelineError::Contract(_) => {
                    StatusCode::BAD_GATEWAY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::BadRequest(m) => m.clone(),
            ApiError::Pipeline(e) if status.is_client_error() => {
                warn!(error = %e, "ballot request rejected");
                e.to_string()
            }
            ApiError::Pipeline(e) => {
                error!(error = %e, "ballot pipeline failed");
                status
                    .canonical_reason()
                    .unwrap_or("Internal error")
                    .to_string()
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

fn parse_fr(field: &str, value: &str) -> Result<Fr, ApiError> {
    fr_from_str(value).map_err(|e| ApiError::BadRequest(format!("{field}: {e}")))
}

pub async fn registry_root(State(state): State<Arc<AppState>>) -> Result<Json<RegistrySnapshot>, ApiError> {
    Ok(Json(state.pipeline.registry_snapshot().await?))
}

// ============ Ballot proofs ============

#[derive(Deserialize)]
pub struct BallotRequest {
    pub secret: String,
    pub nullifier: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalldataResponse {
    pub proof: ProofArtifact,
    /// `exportSolidityCallData`-style string.
    pub calldata: String,
}

pub async fn ballot_calldata(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BallotRequest>,
) -> Result<Json<CalldataResponse>, ApiError> {
    let secret = parse_fr("secret", &req.secret)?;
    let nullifier = parse_fr("nullifier", &req.nullifier)?;

    let proof = state.pipeline.prove_membership(secret, nullifier).await?;
    let calldata = proof
        .to_solidity_calldata()
        .map_err(|e| ApiError::Pipeline(PipelineError::Proving(e.into())))?;

    Ok(Json(CalldataResponse { proof, calldata }))
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub secret: String,
    pub nullifier: String,
    pub contestant_id: String,
}

pub async fn ballot_vote(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteCall>, ApiError> {
    let secret = parse_fr("secret", &req.secret)?;
    let nullifier = parse_fr("nullifier", &req.nullifier)?;

    let call = state
        .pipeline
        .prepare_vote(secret, nullifier, &req.contestant_id)
        .await?;
    Ok(Json(call))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ark_std::rand::{rngs::StdRng, SeedableRng};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use ballot_circuits::{IncrementalMerkleTree, PoseidonHasher};
    use ballot_prover::setup::setup_voting;
    use ballot_prover::{ArkworksBackend, Backend, BallotPipeline, PipelineConfig, ProofEngine};
    use ballot_registry::mock::{MockRpc, MOCK_CONTRACT};
    use ballot_registry::{event_topic, RetrieverConfig, DEFAULT_EVENT_SIGNATURE};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::routes;

    /// Registry of c0, c1 and H(7, 8), contract in sync.
    fn app() -> (Arc<MockRpc>, axum::Router) {
        let hasher = PoseidonHasher::new().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let keys = setup_voting(3, hasher.clone(), &mut rng).unwrap();

        let rpc = Arc::new(MockRpc::new(event_topic(DEFAULT_EVENT_SIGNATURE), 100));
        let leaves = [Fr::from(1u64), Fr::from(2u64), hasher.hash_two(Fr::from(7u64), Fr::from(8u64))];
        for (i, leaf) in leaves.iter().enumerate() {
            rpc.push_registration(*leaf, i as u64, 10 + i as u64);
        }
        let tree = IncrementalMerkleTree::build(3, Fr::from(0u64), hasher.clone(), &leaves).unwrap();
        rpc.set_current_root(tree.root());

        let backend = Backend::Arkworks(ArkworksBackend::new(Arc::new(keys), 3, hasher.clone()));
        let pipeline = BallotPipeline::new(
            rpc.clone(),
            MOCK_CONTRACT,
            DEFAULT_EVENT_SIGNATURE,
            RetrieverConfig {
                backoff: Duration::from_millis(1),
                ..RetrieverConfig::default()
            },
            ProofEngine::new(Arc::new(backend)),
            hasher,
            PipelineConfig {
                max_stale_retries: 0,
                ..PipelineConfig::default()
            },
        );

        (rpc, routes::app(Arc::new(AppState { pipeline })))
    }

    async fn send(app: axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let (_, app) = app();
        let (status, body) = send(app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "backend": "arkworks"}));
    }

    #[tokio::test]
    async fn test_registry_root() {
        let (_, app) = app();
        let (status, body) = send(app, "GET", "/api/registry/root", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["leafCount"], 3);
        assert_eq!(body["inSync"], true);
    }

    #[tokio::test]
    async fn test_calldata() {
        let (_, app) = app();
        let (status, body) = send(
            app,
            "POST",
            "/api/ballot/calldata",
            Some(json!({"secret": "7", "nullifier": "0x8"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        let response: CalldataResponse = serde_json::from_value(body).unwrap();
        let parsed = ProofArtifact::parse_solidity_calldata(&response.calldata).unwrap();
        assert_eq!(parsed, response.proof);
    }

    #[tokio::test]
    async fn test_vote_call() {
        let (_, app) = app();
        let (status, body) = send(
            app,
            "POST",
            "/api/ballot/vote",
            Some(json!({"secret": "7", "nullifier": "8", "contestant_id": "3"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["contestantId"], "3");
        assert_eq!(body["contract"], MOCK_CONTRACT);
        assert_eq!(body["proof"]["publicInputs"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_unregistered_voter_is_not_found() {
        let (_, app) = app();
        let (status, body) = send(
            app,
            "POST",
            "/api/ballot/calldata",
            Some(json!({"secret": "9", "nullifier": "10"})),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_bad_input() {
        let (_, app) = app();
        let (status, body) = send(
            app.clone(),
            "POST",
            "/api/ballot/calldata",
            Some(json!({"secret": "seven", "nullifier": "8"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|e| e.starts_with("secret")));

        let (status, _) = send(
            app,
            "POST",
            "/api/ballot/vote",
            Some(json!({"secret": "7", "nullifier": "8", "contestant_id": "first"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stale_registry_is_conflict() {
        let (rpc, app) = app();
        rpc.set_current_root(Fr::from(99u64));

        let (status, _) = send(
            app,
            "POST",
            "/api/ballot/calldata",
            Some(json!({"secret": "7", "nullifier": "8"})),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_generic() {
        let (rpc, app) = app();
        rpc.fail_next(ballot_registry::RpcError::Transport("connection refused to 10.0.0.5".into()));

        let (status, body) = send(app, "GET", "/api/registry/root", None).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Bad Gateway");
    }
}
