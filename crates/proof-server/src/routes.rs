//! API route definitions.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Create API routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Registry state
        .route("/api/registry/root", get(handlers::registry_root))
        // Ballot proofs
        .route("/api/ballot/calldata", post(handlers::ballot_calldata))
        .route("/api/ballot/vote", post(handlers::ballot_vote))
}

/// Full application: routes, CORS and request tracing.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api_routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
