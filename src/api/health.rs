use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub vector_store: String,
}

/// Liveness plus a vector-store connectivity probe. An unreachable store is
/// reported, not failed on.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let vector_store = if state.vector_db.health_check().await {
        "healthy"
    } else {
        "unreachable"
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        vector_store: vector_store.to_string(),
    })
}
