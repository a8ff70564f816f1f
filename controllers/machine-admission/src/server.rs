//! Admission HTTP server.
//!
//! Plain HTTP; TLS is terminated by the cluster-provided frontend the
//! webhook is registered behind.

use crate::handler::{self, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the admission router from explicit state.
///
/// Constructed once at startup; every handler gets its dependencies from
/// the shared state rather than from globals.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/mutate", post(handler::mutate))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Ready only when MAAS answers with valid credentials
async fn readyz(State(state): State<Arc<AppState>>) -> Result<&'static str, (StatusCode, String)> {
    match state.inventory.version().await {
        Ok(_) => Ok("ok"),
        Err(e) => Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
    }
}
