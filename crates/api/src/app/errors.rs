//! Consistent JSON error responses.
//!
//! Every failure leaves the API as `{"statusCode", "error", "message"}`.
//! Upstream failures are logged here, once, and their detail is not echoed
//! to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use storefront_core::DomainError;
use storefront_infra::{AuthError, DirectoryError, ScopeError, StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Upstream(detail) => {
                tracing::error!(error = %detail, "request failed upstream");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        json_error(status, message)
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "statusCode": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Response for a hostname no tenant is bound to. Not an [`ApiError`]: the
/// resolution middleware writes it directly and stops the pipeline.
pub fn tenant_not_found(hostname: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        axum::Json(json!({
            "statusCode": 404,
            "message": format!("Tenant not found for domain: {hostname}"),
        })),
    )
        .into_response()
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(_) | DomainError::InvalidId(_) => ApiError::Validation(err.to_string()),
            DomainError::NotFound(msg) => ApiError::NotFound(msg),
            DomainError::Conflict(_) => ApiError::Conflict(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(msg) => ApiError::NotFound(msg),
            DirectoryError::Invalid(e) => e.into(),
            DirectoryError::Conflict(msg) => ApiError::Conflict(msg),
            DirectoryError::Store(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AuthError::InvalidToken | AuthError::Token(_) => ApiError::Unauthorized("Invalid token".into()),
            AuthError::Store(e) => e.into(),
            AuthError::Credential(_) | AuthError::Join(_) => ApiError::Upstream(err.to_string()),
        }
    }
}

/// A scoped handle without a tenant is a wiring bug, not a client error.
impl From<ScopeError> for ApiError {
    fn from(err: ScopeError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}
