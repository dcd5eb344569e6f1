//! Base routes every HTTP server carries.
//!
//! - `GET /ping`    → `pong`
//! - `GET /healthz` → liveness checks, 503 if any fails
//! - `GET /livez`   → same as `/healthz`
//! - `GET /readyz`  → readiness checks, 200 only while the orchestrator is
//!   running and every check passes

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tokio::sync::watch;

use crate::health::{HealthRegistry, HealthResponse};
use crate::lifecycle::Phase;

#[derive(Clone)]
struct HealthState {
    phase: Option<watch::Receiver<Phase>>,
    health: Arc<HealthRegistry>,
}

/// Build the base router with no health checks. Without a phase receiver,
/// readiness mirrors liveness.
pub fn base_router(phase: Option<watch::Receiver<Phase>>) -> Router {
    health_router(phase, Arc::new(HealthRegistry::new()))
}

/// Build the base router, aggregating the checks in `health`.
pub fn health_router(phase: Option<watch::Receiver<Phase>>, health: Arc<HealthRegistry>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/healthz", get(live))
        .route("/livez", get(live))
        .route("/readyz", get(ready))
        .with_state(HealthState { phase, health })
}

async fn ping() -> &'static str {
    "pong"
}

fn respond(response: HealthResponse) -> (StatusCode, Json<HealthResponse>) {
    let status = if response.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

async fn live(State(state): State<HealthState>) -> impl IntoResponse {
    respond(state.health.check_liveness().await)
}

async fn ready(State(state): State<HealthState>) -> impl IntoResponse {
    let current = state.phase.as_ref().map(|rx| *rx.borrow());

    let mut response = state.health.check_readiness().await;
    match current {
        None => {}
        Some(Phase::Running) => response.phase = Some(Phase::Running.as_str()),
        Some(other) => {
            response.status = "unavailable";
            response.phase = Some(other.as_str());
        }
    }
    respond(response)
}
