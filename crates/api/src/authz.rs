//! Tenant and role guards.
//!
//! The checks are plain functions over request state so they can be tested
//! without a server; the middlewares below only collect that state.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use storefront_auth::{Principal, authorize, explain_authorization};
use storefront_core::Tenant;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};
use crate::metadata::ResolvedMetadata;
use crate::middleware::{is_admin_path, route_metadata};

/// Tenant guard decision.
///
/// Allows public, bypass-tenant and administrative routes outright. Otherwise
/// an ACTIVE tenant must be attached, and an authenticated principal that
/// belongs to a tenant must belong to this one.
pub fn check_tenant(
    metadata: &ResolvedMetadata,
    path: &str,
    admin_prefix: &str,
    tenant: Option<&Tenant>,
    principal: Option<&Principal>,
) -> Result<(), ApiError> {
    if metadata.public || metadata.bypass_tenant || is_admin_path(path, admin_prefix) {
        return Ok(());
    }

    let tenant = tenant.ok_or_else(|| {
        ApiError::Unauthorized("Tenant not found. This resource requires a valid tenant.".into())
    })?;
    if !tenant.is_active() {
        return Err(ApiError::Unauthorized(format!(
            "Tenant is not active. Status: {}",
            tenant.status
        )));
    }

    if let Some(principal_tenant) = principal.and_then(|p| p.tenant_id) {
        if principal_tenant != tenant.id {
            return Err(ApiError::Forbidden("Principal does not belong to this tenant".into()));
        }
    }
    Ok(())
}

/// Role guard decision. Denial is always Forbidden, never Unauthorized.
pub fn check_roles(metadata: &ResolvedMetadata, principal: Option<&Principal>) -> Result<(), ApiError> {
    if metadata.roles.is_empty() {
        return Ok(());
    }
    let principal = principal.ok_or_else(|| ApiError::Forbidden("Forbidden resource".into()))?;

    authorize(principal.role, &metadata.roles).map_err(|denied| {
        let explanation = explain_authorization(principal.role, &metadata.roles);
        tracing::info!(user_id = %principal.id, reason = %explanation.reason, "role check denied");
        ApiError::Forbidden(denied.to_string())
    })
}

pub async fn tenant_guard(
    State(services): State<Arc<AppServices>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(metadata) = route_metadata(&services, &req) {
        let tenant = req.extensions().get::<TenantContext>().map(TenantContext::tenant);
        let principal = req.extensions().get::<PrincipalContext>().map(PrincipalContext::principal);
        check_tenant(
            &metadata,
            req.uri().path(),
            &services.config.admin_path_prefix,
            tenant,
            principal,
        )
        .inspect_err(|e| tracing::info!(path = %req.uri().path(), error = %e, "tenant check denied"))?;
    }
    Ok(next.run(req).await)
}

pub async fn role_guard(
    State(services): State<Arc<AppServices>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(metadata) = route_metadata(&services, &req) {
        let principal = req.extensions().get::<PrincipalContext>().map(PrincipalContext::principal);
        check_roles(&metadata, principal)?;
    }
    Ok(next.run(req).await)
}
