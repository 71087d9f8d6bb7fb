//! Handlers for the authorization API
//!
//! Each handler is a thin adapter over [`AuthorizationEngine`](zanzibar_core::AuthorizationEngine):
//! decode the JSON body, call the engine, encode the result. Engine errors are
//! mapped to status codes by [`ApiError`].

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zanzibar_core::{
    CheckRequest, CheckResponse, NamespacesResponse, ParentRelationsRequest,
    ParentRelationsResponse, WriteRelationsRequest, WriteRequest,
};

use crate::error::{ApiError, ApiResult};
use crate::server::ZanzibarServer;

/// Upper bound on checks answered by one batch request
pub const MAX_BATCH_CHECKS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct BatchCheckRequest {
    pub checks: Vec<CheckRequest>,
}

#[derive(Debug, Serialize)]
pub struct BatchCheckResponse {
    pub results: Vec<CheckResponse>,
}

pub async fn check(
    State(server): State<ZanzibarServer>,
    Json(request): Json<CheckRequest>,
) -> ApiResult<Json<CheckResponse>> {
    let allowed = server.engine.check(&request.parent, &request.child).await?;
    Ok(Json(CheckResponse { allowed }))
}

/// All checks are answered against the same snapshot
pub async fn batch_check(
    State(server): State<ZanzibarServer>,
    Json(request): Json<BatchCheckRequest>,
) -> ApiResult<Json<BatchCheckResponse>> {
    if request.checks.len() > MAX_BATCH_CHECKS {
        return Err(ApiError::validation(format!(
            "at most {} checks per batch, got {}",
            MAX_BATCH_CHECKS,
            request.checks.len()
        )));
    }

    let results = server.engine.batch_check(&request.checks).await?;
    debug!("Answered batch of {} checks", results.len());
    Ok(Json(BatchCheckResponse { results }))
}

pub async fn write(
    State(server): State<ZanzibarServer>,
    Json(request): Json<WriteRequest>,
) -> ApiResult<StatusCode> {
    server.engine.write(request).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn namespaces(
    State(server): State<ZanzibarServer>,
) -> ApiResult<Json<NamespacesResponse>> {
    let namespaces = server.engine.namespaces().await?;
    Ok(Json(NamespacesResponse { namespaces }))
}

pub async fn write_namespace_relations(
    State(server): State<ZanzibarServer>,
    Json(request): Json<WriteRelationsRequest>,
) -> ApiResult<StatusCode> {
    server.engine.write_namespace_relations(request).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn parent_relations(
    State(server): State<ZanzibarServer>,
    Json(request): Json<ParentRelationsRequest>,
) -> ApiResult<Json<ParentRelationsResponse>> {
    let relations = server
        .engine
        .parent_relations(&request.parent_namespace, &request.parent_id, &request.child)
        .await?;
    Ok(Json(ParentRelationsResponse { relations }))
}
