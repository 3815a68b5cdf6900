use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    Json,
};
use chrono::Utc;
use tracing::{debug, info};

use super::response::ApiResult;
use super::AppState;
use crate::models::{CreateTelemetryEvent, TelemetryEvent};
use crate::repositories::SortDirection;

pub const INGEST_ACK: &str = "CERN Telemetry Ingested: Event queued for analysis and persistence.";
pub const CLEAR_ACK: &str = "Post-Mortem buffer cleared. System ready for new fill.";

/// Accepts a reading and queues it. The acknowledgment does not mean it was stored.
#[axum::debug_handler]
pub async fn ingest(
    State(state): State<AppState>,
    payload: Result<Json<CreateTelemetryEvent>, JsonRejection>,
) -> ApiResult<&'static str> {
    let Json(payload) = payload?;
    let event = payload.into_new(Utc::now());

    debug!(
        "Queueing {} from {}",
        event.event_type_label(),
        event.sensor_label()
    );
    state.pool.submit(event)?;

    Ok(INGEST_ACK)
}

pub async fn history(State(state): State<AppState>) -> ApiResult<Json<Vec<TelemetryEvent>>> {
    let events = state.repository.find_all(SortDirection::Descending).await?;
    Ok(Json(events))
}

pub async fn by_sensor(
    State(state): State<AppState>,
    sensor_id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Vec<TelemetryEvent>>> {
    let Path(sensor_id) = sensor_id?;
    let events = state.repository.find_by_sensor_id(&sensor_id).await?;
    Ok(Json(events))
}

pub async fn clear_history(State(state): State<AppState>) -> ApiResult<&'static str> {
    state.repository.delete_all().await?;
    info!("Telemetry history cleared");
    Ok(CLEAR_ACK)
}
