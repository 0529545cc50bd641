use axum::{Extension, Json, response::IntoResponse};
use serde_json::json;

use crate::context::TenantContext;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// The tenant bound to the request hostname, for storefront clients that
/// need branding before anyone signs in.
pub async fn current_tenant(Extension(tenant): Extension<TenantContext>) -> impl IntoResponse {
    Json(tenant.tenant().clone())
}
