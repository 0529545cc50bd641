//! Platform administration of tenants. Mounted under the administrative
//! prefix, so no tenant is resolved for these requests.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};

use storefront_core::{NewTenant, TenantId, TenantPatch};

use crate::app::dto::UpdateStatusRequest;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/tenants", get(list_tenants).post(create_tenant))
        .route("/tenants/:id", get(get_tenant).put(update_tenant).delete(delete_tenant))
        .route("/tenants/:id/status", put(update_tenant_status))
}

fn tenant_id(raw: &str) -> Result<TenantId, ApiError> {
    raw.parse::<TenantId>().map_err(ApiError::from)
}

pub async fn list_tenants(Extension(services): Extension<Arc<AppServices>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.directory.find_all().await?))
}

pub async fn get_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.directory.find_by_id(tenant_id(&id)?).await?))
}

pub async fn create_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<NewTenant>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let tenant = services.directory.create(body).await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

pub async fn update_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<TenantPatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = tenant_id(&id)?;
    let Json(patch) = payload?;
    Ok(Json(services.directory.update(id, patch).await?))
}

pub async fn update_tenant_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = tenant_id(&id)?;
    let Json(body) = payload?;
    Ok(Json(services.directory.update_status(id, body.status).await?))
}

pub async fn delete_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.directory.delete(tenant_id(&id)?).await?))
}
