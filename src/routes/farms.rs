//! Readings side of the API: the latest farm snapshot, alerts, dashboard
//! overview, and the refresh controls.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ranges::{farm_status, Tier};
use crate::{CycleOutcome, Farm, Monitor, SensorReading};

// ---

pub fn router() -> Router<Monitor> {
    // ---
    Router::new()
        .route("/farms", get(list_farms))
        .route("/alerts", get(alerts))
        .route("/overview", get(overview))
        .route("/refresh", post(refresh))
        .route("/auto-refresh", get(get_auto_refresh).put(put_auto_refresh))
}

#[derive(Debug, Serialize)]
struct FarmView {
    #[serde(flatten)]
    farm: Farm,
    reading: Option<SensorReading>,
    status: Tier,
}

#[derive(Debug, Serialize)]
struct FarmsResponse {
    cycle: u64,
    taken_at: Option<DateTime<Utc>>,
    refreshing: bool,
    auto_refresh: bool,
    farms: Vec<FarmView>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AutoRefresh {
    enabled: bool,
}

async fn list_farms(State(monitor): State<Monitor>) -> Json<FarmsResponse> {
    // ---
    let latest = monitor.latest();
    let farms = latest
        .snapshot
        .farms
        .iter()
        .map(|entry| FarmView {
            farm: entry.farm.clone(),
            reading: entry.reading.clone(),
            status: farm_status(entry.reading.as_ref()),
        })
        .collect();

    Json(FarmsResponse {
        cycle: latest.snapshot.cycle,
        taken_at: latest.snapshot.taken_at,
        refreshing: monitor.is_refreshing(),
        auto_refresh: monitor.auto_refresh_enabled(),
        farms,
    })
}

async fn alerts(State(monitor): State<Monitor>) -> impl IntoResponse {
    Json(monitor.alerts())
}

async fn overview(State(monitor): State<Monitor>) -> impl IntoResponse {
    Json(monitor.overview())
}

/// Run a cycle out of band; `409` if one is already in flight.
async fn refresh(State(monitor): State<Monitor>) -> impl IntoResponse {
    // ---
    info!("POST /refresh");
    let outcome = monitor.refresh_now().await;
    let status = match outcome {
        CycleOutcome::Completed(_) => StatusCode::OK,
        CycleOutcome::Busy => StatusCode::CONFLICT,
        CycleOutcome::Aborted => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(outcome))
}

async fn get_auto_refresh(State(monitor): State<Monitor>) -> Json<AutoRefresh> {
    Json(AutoRefresh {
        enabled: monitor.auto_refresh_enabled(),
    })
}

async fn put_auto_refresh(
    State(monitor): State<Monitor>,
    Json(body): Json<AutoRefresh>,
) -> Json<AutoRefresh> {
    // ---
    monitor.set_auto_refresh(body.enabled);
    Json(AutoRefresh {
        enabled: monitor.auto_refresh_enabled(),
    })
}
