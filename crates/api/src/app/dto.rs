use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use serde_json::Value;

use storefront_core::TenantStatus;
use storefront_infra::Document;

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

/// Fields are optional so a missing one yields a specific 400 message.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TenantStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkCreateRequest {
    pub items: Vec<Value>,
}

// -------------------------
// Mapping helpers
// -------------------------

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

pub fn into_document(value: Value) -> Result<Document, ApiError> {
    match value {
        Value::Object(document) => Ok(document),
        _ => Err(ApiError::Validation("request body must be a JSON object".into())),
    }
}

/// Minimal product shape check: a non-empty `name` and, when given, a
/// non-negative numeric `price`.
pub fn validate_product(document: &Document, require_name: bool) -> Result<(), ApiError> {
    match document.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => {}
        None if !require_name => {}
        _ => return Err(ApiError::Validation("name must be a non-empty string".into())),
    }
    match document.get("price") {
        None => Ok(()),
        Some(price) if price.as_f64().is_some_and(|p| p >= 0.0) => Ok(()),
        Some(_) => Err(ApiError::Validation("price must be a non-negative number".into())),
    }
}
