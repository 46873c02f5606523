// src/routes/health.rs
//! Health check endpoint for the farmwatch service.
//!
//! `/health` lets container orchestrators and CI verify the service is up. It
//! also reports where the poller is in its lifecycle and which cycle was last
//! published, so a stalled poller is visible without reading logs.
//!
//! Follows the Explicit Module Boundary Pattern (EMBP): the handler stays
//! private and only the subrouter is exported to the gateway (`mod.rs`).

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{Lifecycle, Monitor};

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    poller: Lifecycle,
    last_cycle: u64,
    refreshing: bool,
}

/// Handle `GET /health`.
///
/// Reads in-memory state only; never touches the telemetry API.
async fn health(State(monitor): State<Monitor>) -> Json<HealthResponse> {
    // ---
    let poller = monitor.lifecycle();
    Json(HealthResponse {
        status: if poller == Lifecycle::Stopped { "stopped" } else { "ok" },
        poller,
        last_cycle: monitor.latest().snapshot.cycle,
        refreshing: monitor.is_refreshing(),
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<Monitor> {
    Router::new().route("/health", get(health))
}
