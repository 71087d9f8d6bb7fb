use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::server::ZanzibarServer;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

/// Reports whether the tuple store is reachable
pub async fn health_check(
    State(server): State<ZanzibarServer>,
) -> (StatusCode, Json<HealthResponse>) {
    let healthy = server.engine.health_check().await;
    let (status_code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let response = HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}
