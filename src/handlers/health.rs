use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppState;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check OK")
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store = if state.config.database_url.is_some() {
        "postgres"
    } else {
        "memory"
    };

    Json(json!({
        "status": "ok",
        "store": store
    }))
}
