pub mod health;
pub mod response;
pub mod telemetry;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::engine::WorkerPool;
use crate::repositories::TelemetryRepository;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn TelemetryRepository>,
    pub pool: Arc<WorkerPool>,
}

pub fn build_router(repository: Arc<dyn TelemetryRepository>, pool: Arc<WorkerPool>) -> Router {
    let state = AppState { repository, pool };

    let telemetry = Router::new()
        .route("/ingest", post(telemetry::ingest))
        .route(
            "/history",
            get(telemetry::history).delete(telemetry::clear_history),
        )
        .route("/sensor/{sensor_id}", get(telemetry::by_sensor));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1/telemetry", telemetry)
        .layer(CatchPanicLayer::custom(response::panic_response))
        .with_state(state)
}
