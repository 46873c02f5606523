use axum::Router;

use crate::Monitor;

mod controls;
mod farms;
mod health;

// ---

pub fn router(monitor: Monitor) -> Router {
    // ---
    Router::new()
        .merge(farms::router())
        .merge(controls::router())
        .merge(health::router())
        .with_state(monitor)
}
