use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::AppState;

/// Liveness/readiness probe. Fails when the database is unreachable.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Database unreachable")
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.store.health_check().await?;
    Ok(Json(json!({
        "status": "healthy",
        "service": state.config.service_name.clone(),
        "version": state.config.service_version.clone(),
    })))
}
