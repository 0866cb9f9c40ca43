//! Health Check API Handler

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health, GET /healthz
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Healthcheck: OK\n")
}
