use axum::{Extension, Json, response::IntoResponse};
use serde_json::json;

use crate::context::PrincipalContext;

pub async fn public_info() -> impl IntoResponse {
    Json(json!({ "message": "This endpoint is public and available to everyone" }))
}

pub async fn profile(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let user = principal.principal();
    Json(json!({
        "message": "This endpoint requires authentication",
        "user": {
            "id": user.id,
            "email": user.email,
            "firstName": user.first_name,
            "lastName": user.last_name,
            "role": user.role,
        },
    }))
}

pub async fn admin_only(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let user = principal.principal();
    Json(json!({
        "message": "This endpoint requires ADMIN role",
        "user": { "id": user.id, "email": user.email, "role": user.role },
    }))
}

pub async fn super_admin_only(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let user = principal.principal();
    Json(json!({
        "message": "This endpoint requires SUPER_ADMIN role",
        "user": { "id": user.id, "email": user.email, "role": user.role },
    }))
}

pub async fn staff_only(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let user = principal.principal();
    Json(json!({
        "message": "This endpoint requires STAFF role",
        "user": {
            "id": user.id,
            "email": user.email,
            "role": user.role,
            "tenantId": user.tenant_id,
        },
    }))
}
