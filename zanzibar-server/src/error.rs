use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use zanzibar_core::ZanzibarError;

/// Standard API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Error type/code
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Main API error enum
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Unprocessable entity: {message}")]
    UnprocessableEntity { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::UnprocessableEntity { .. } => "TRAVERSAL_LIMIT",
            ApiError::ServiceUnavailable { .. } => "STORAGE_UNAVAILABLE",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<ZanzibarError> for ApiError {
    fn from(err: ZanzibarError) -> Self {
        let message = err.to_string();
        if err.is_invalid_input() {
            ApiError::Validation { message }
        } else if err.is_resource_exhausted() {
            ApiError::UnprocessableEntity { message }
        } else if err.is_retryable() {
            ApiError::ServiceUnavailable { message }
        } else {
            ApiError::Internal { message }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        if status_code.is_server_error() {
            error!(
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %self,
                "API error occurred"
            );
        } else {
            warn!(
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %self,
                "Request rejected"
            );
        }

        let body = ApiErrorResponse {
            error_type: self.error_type().to_string(),
            message: self.to_string(),
            timestamp: chrono::Utc::now(),
        };

        (status_code, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
