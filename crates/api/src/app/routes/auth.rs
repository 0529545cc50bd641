use std::sync::Arc;

use axum::{Extension, Json, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};

use crate::app::dto::LoginRequest;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let email = body
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Email is required".into()))?;
    let password = body
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("Password is required".into()))?;

    let response = services.auth.login(&email, &password).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
