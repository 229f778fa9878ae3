//! HTTP API server for ballot membership proofs.

use std::sync::Arc;

use ballot_circuits::PoseidonHasher;
use ballot_prover::setup::CircuitKeys;
use ballot_prover::{ArkworksBackend, Backend, BallotPipeline, ProofEngine, SnarkjsBackend};
use ballot_registry::JsonRpcClient;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod handlers;
mod routes;

use config::{BackendKind, ServerConfig};

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: BallotPipeline,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // a missing .env is fine, the process environment is used as is
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ballot=debug")))
        .init();

    let config = ServerConfig::from_env()?;
    info!(
        contract = %config.contract_address,
        depth = config.tree_depth,
        backend = ?config.backend,
        "starting ballot proof server"
    );

    let hasher = PoseidonHasher::new()?;
    let backend = match config.backend {
        BackendKind::Arkworks => {
            let keys_dir = config.keys_dir.clone();
            let depth = config.tree_depth;
            // trusted setup on first start can take a while
            let keys = tokio::task::spawn_blocking(move || CircuitKeys::load_or_setup(&keys_dir, depth)).await??;
            Backend::Arkworks(ArkworksBackend::new(Arc::new(keys.voting), depth, hasher.clone()))
        }
        BackendKind::Snarkjs => Backend::Snarkjs(SnarkjsBackend::from_artifacts_dir(
            config.snarkjs_bin.clone(),
            &config.keys_dir,
            config.pipeline_timeout,
        )),
    };

    let rpc = Arc::new(JsonRpcClient::new(config.rpc_url.clone(), config.rpc_timeout)?);
    let pipeline = BallotPipeline::new(
        rpc,
        config.contract_address.clone(),
        &config.event_signature,
        config.retriever_config(),
        ProofEngine::new(Arc::new(backend)),
        hasher,
        config.pipeline_config(),
    );

    let app = routes::app(Arc::new(AppState { pipeline }));

    let addr = config.socket_addr();
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
