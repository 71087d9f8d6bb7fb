use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    handlers::{authorization, health},
    server::ZanzibarServer,
};

/// Create health check routes
pub fn health_routes() -> Router<ZanzibarServer> {
    Router::new().route("/health", get(health::health_check))
}

/// Create authorization routes
pub fn authorization_routes() -> Router<ZanzibarServer> {
    Router::new()
        .route("/check", post(authorization::check))
        .route("/check/batch", post(authorization::batch_check))
        .route("/write", post(authorization::write))
        .route("/parent-relations", post(authorization::parent_relations))
        // Schema
        .route("/namespaces", get(authorization::namespaces))
        .route(
            "/namespaces/relations",
            post(authorization::write_namespace_relations),
        )
}

/// Create all application routes
pub fn create_routes() -> Router<ZanzibarServer> {
    Router::new()
        .merge(health_routes())
        .nest("/api/v1", authorization_routes())
}
