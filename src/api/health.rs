use axum::{extract::State, Json};
use serde_json::{json, Value};

use super::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "pending": state.pool.pending(),
    }))
}
