//! Health endpoint
//!
//! Liveness probe for load balancers and uptime monitors.

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
