use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;

use super::{AppState, HealthResponse};

/// `GET /api/health`
///
/// Answers 503 while the database is unreachable.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    match state.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: true,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: false,
                }),
            )
        }
    }
}
