//! Catalogue endpoints. Products are tenant-owned: every handler works through
//! [`ScopedDb`], so no query here mentions a tenant.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, Path, Query, rejection::JsonRejection},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
};
use serde_json::{Value, json};

use storefront_infra::{AggregateFn, DataStoreExt, Filter, Page, SharedStore, TenantScopedStore};

use crate::app::dto::{self, BulkCreateRequest, ListQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub const PRODUCTS: &str = "products";

/// Data access bound to the request's ambient tenant.
pub struct ScopedDb(pub TenantScopedStore<SharedStore>);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ScopedDb {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let services = parts
            .extensions
            .get::<Arc<AppServices>>()
            .ok_or_else(|| ApiError::Upstream("application services not installed".into()))?;
        let scoped = TenantScopedStore::from_context(Arc::clone(&services.store))?;
        Ok(ScopedDb(scoped))
    }
}

fn by_id(id: &str) -> Filter {
    Filter::eq("id", id)
}

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("Product with ID {id} not found"))
}

pub async fn list_products(
    ScopedDb(db): ScopedDb,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = match query.category {
        Some(category) => Filter::eq("category", category),
        None => Filter::all(),
    };
    let page = Page::new(query.limit, query.offset.unwrap_or(0));
    Ok(Json(db.find_many(PRODUCTS, filter, page).await?))
}

pub async fn get_product(ScopedDb(db): ScopedDb, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let product = db.find_unique(PRODUCTS, by_id(&id)).await?.ok_or_else(|| not_found(&id))?;
    Ok(Json(product))
}

pub async fn product_stats(ScopedDb(db): ScopedDb) -> Result<impl IntoResponse, ApiError> {
    let total = db.count(PRODUCTS, Filter::all()).await?;
    let mut price = serde_json::Map::new();
    for (label, function) in [
        ("sum", AggregateFn::Sum),
        ("avg", AggregateFn::Avg),
        ("min", AggregateFn::Min),
        ("max", AggregateFn::Max),
    ] {
        let value = db.aggregate(PRODUCTS, Filter::all(), "price", function).await?;
        price.insert(label.to_string(), json!(value));
    }
    let by_category = db.group_by(PRODUCTS, Filter::all(), vec!["category".to_string()]).await?;

    Ok(Json(json!({
        "total": total,
        "price": price,
        "byCategory": by_category
            .into_iter()
            .map(|group| json!({
                "category": group.key.get("category").cloned().unwrap_or(Value::Null),
                "count": group.count,
            }))
            .collect::<Vec<_>>(),
    })))
}

pub async fn create_product(
    ScopedDb(db): ScopedDb,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let document = dto::into_document(body)?;
    dto::validate_product(&document, true)?;

    let created = db.create(PRODUCTS, document).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// All-or-nothing: one invalid item rejects the whole batch.
pub async fn bulk_create_products(
    ScopedDb(db): ScopedDb,
    payload: Result<Json<BulkCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    if body.items.is_empty() {
        return Err(ApiError::Validation("items must not be empty".into()));
    }
    let documents = body
        .items
        .into_iter()
        .map(|item| {
            let document = dto::into_document(item)?;
            dto::validate_product(&document, true)?;
            Ok(document)
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let count = db.create_many(PRODUCTS, documents).await?;
    Ok((StatusCode::CREATED, Json(json!({ "count": count }))))
}

pub async fn update_product(
    ScopedDb(db): ScopedDb,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let document = dto::into_document(body)?;
    dto::validate_product(&document, false)?;

    let updated = db.update(PRODUCTS, by_id(&id), document).await?.ok_or_else(|| not_found(&id))?;
    Ok(Json(updated))
}

pub async fn delete_product(ScopedDb(db): ScopedDb, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let deleted = db.delete(PRODUCTS, by_id(&id)).await?.ok_or_else(|| not_found(&id))?;
    Ok(Json(deleted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use storefront_infra::{InMemoryStore, tenant_context};
    use storefront_core::TenantId;

    use crate::config::Config;

    fn parts_with_services() -> Parts {
        let services = Arc::new(AppServices::with_store(Config::default(), Arc::new(InMemoryStore::new())));
        let (mut parts, ()) = Request::builder().uri("/products").body(()).unwrap().into_parts();
        parts.extensions.insert(services);
        parts
    }

    #[tokio::test]
    async fn scoped_db_binds_the_ambient_tenant() {
        let tenant = TenantId::new();
        let mut parts = parts_with_services();
        let ScopedDb(db) = tenant_context::run(tenant, ScopedDb::from_request_parts(&mut parts, &()))
            .await
            .unwrap();
        assert_eq!(db.tenant_id(), tenant);
    }

    #[tokio::test]
    async fn scoped_db_without_tenant_is_a_server_error() {
        let mut parts = parts_with_services();
        let err = ScopedDb::from_request_parts(&mut parts, &()).await.err().unwrap();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
