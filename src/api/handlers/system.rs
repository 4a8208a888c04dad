//! System endpoints: health check and maintenance.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::CleanupResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, MatchError};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    connections: usize,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp and the number of live push connections.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            connections: state.registry.len(),
        }),
    )
}

/// `POST /admin/cleanup`: Run the cleanup sweep now.
///
/// # Errors
///
/// Returns [`MatchError::TransientStoreFailure`] if the sweep cannot reach
/// the store.
#[utoipa::path(
    post,
    path = "/api/v1/admin/cleanup",
    tag = "Admin",
    summary = "Run cleanup",
    description = "Expires overdue pending matches and confirmations that saw no message within the grace window.",
    responses(
        (status = 200, description = "Sweep report", body = CleanupResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn cleanup_handler(State(state): State<AppState>) -> Result<impl IntoResponse, MatchError> {
    let report = state.service.run_cleanup().await?;
    Ok(Json(CleanupResponse::from(report)))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

/// Admin routes mounted under /api/v1.
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/cleanup", post(cleanup_handler))
}
