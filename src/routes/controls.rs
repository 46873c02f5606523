//! Actuator control endpoints.
//!
//! Out-of-range frequencies are clamped by the store, never rejected. The
//! only failure is an unknown farm, answered with `404`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::{Actuator, ControlError, ControlState, FarmId, Monitor};

// ---

pub fn router() -> Router<Monitor> {
    // ---
    Router::new()
        .route("/farms/{farm_id}/controls", get(get_controls))
        .route("/farms/{farm_id}/controls/toggle", post(toggle))
        .route("/farms/{farm_id}/controls/fan-frequency", put(set_fan_frequency))
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    actuator: Actuator,
}

#[derive(Debug, Deserialize)]
struct FrequencyRequest {
    hz: f64,
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        // ---
        let status = match self {
            ControlError::UnknownFarm(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn get_controls(
    State(monitor): State<Monitor>,
    Path(farm_id): Path<FarmId>,
) -> Result<Json<ControlState>, ControlError> {
    debug!("GET /farms/{}/controls", farm_id);
    monitor.control_state(farm_id).map(Json)
}

async fn toggle(
    State(monitor): State<Monitor>,
    Path(farm_id): Path<FarmId>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ControlState>, ControlError> {
    // ---
    info!("POST /farms/{}/controls/toggle {:?}", farm_id, body.actuator);
    monitor.toggle(farm_id, body.actuator).map(Json)
}

async fn set_fan_frequency(
    State(monitor): State<Monitor>,
    Path(farm_id): Path<FarmId>,
    Json(body): Json<FrequencyRequest>,
) -> Result<Json<ControlState>, ControlError> {
    // ---
    info!("PUT /farms/{}/controls/fan-frequency {}", farm_id, body.hz);
    monitor.set_fan_frequency(farm_id, body.hz).map(Json)
}
