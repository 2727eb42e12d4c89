//! Health check endpoint

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy"
    pub status: String,
    /// Storage backend in use
    pub backend: String,
    /// Version of the service
    pub version: String,
}

/// Health check endpoint (round-trips to the storage backend)
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service and storage are reachable", body = HealthResponse),
        (status = 503, description = "Storage is unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let catalog = &state.services.catalog;
    let (code, status) = match catalog.ping().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            backend: catalog.backend_name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
