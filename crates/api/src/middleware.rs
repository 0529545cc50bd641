//! Request pipeline: tenant resolution and authentication.
//!
//! Both are axum `from_fn_with_state` middlewares over the shared
//! [`AppServices`]. Guards that only *check* request state live in
//! [`crate::authz`].

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use storefront_infra::tenant_context;

use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};
use crate::metadata::ResolvedMetadata;

/// Metadata of the route this request matched. `None` for unmatched requests,
/// which fall through to the 404 fallback.
pub(crate) fn route_metadata(services: &AppServices, req: &Request) -> Option<ResolvedMetadata> {
    req.extensions()
        .get::<MatchedPath>()
        .map(|path| services.routes.resolve(req.method(), path.as_str()))
}

/// Literal prefix check on the raw path (no decoding or normalization).
pub(crate) fn is_admin_path(path: &str, admin_prefix: &str) -> bool {
    path.starts_with(admin_prefix)
}

/// Hostname of the request, from `Host` (or the absolute URI), without port.
pub fn request_hostname(req: &Request) -> String {
    let raw = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host())
        .unwrap_or_default();
    strip_port(raw).to_string()
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // [v6]:port
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Tenant resolution: bind the tenant owning the request hostname for the rest
/// of the pipeline.
///
/// - admin paths skip resolution entirely
/// - an unknown hostname gets a 404 naming it, and nothing downstream runs
/// - directory failures go to the error mapper (500), never to the 404 path
pub async fn resolve_tenant(State(services): State<Arc<AppServices>>, mut req: Request, next: Next) -> Response {
    if is_admin_path(req.uri().path(), &services.config.admin_path_prefix) {
        tracing::debug!(path = %req.uri().path(), "administrative path; tenant resolution bypassed");
        return next.run(req).await;
    }

    let hostname = request_hostname(&req);
    match services.directory.find_by_domain(&hostname).await {
        Ok(Some(tenant)) => {
            let tenant_id = tenant.id;
            tracing::debug!(%hostname, %tenant_id, "tenant resolved");
            req.extensions_mut().insert(TenantContext::new(tenant));
            tenant_context::run(tenant_id, next.run(req)).await
        }
        Ok(None) => {
            tracing::info!(%hostname, "no tenant bound to hostname");
            errors::tenant_not_found(&hostname)
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Authentication guard: verify the bearer token and attach the principal.
pub async fn authenticate(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(metadata) = route_metadata(&services, &req) else {
        return Ok(next.run(req).await);
    };
    if metadata.public {
        return Ok(next.run(req).await);
    }

    let token = extract_bearer(req.headers())?.to_owned();
    let principal = services.auth.verify_token(&token).await.map_err(|e| {
        tracing::info!(path = %req.uri().path(), error = %e, "authentication failed");
        ApiError::from(e)
    })?;

    tracing::debug!(user_id = %principal.id, role = %principal.role, "authenticated");
    req.extensions_mut().insert(PrincipalContext::new(principal));
    Ok(next.run(req).await)
}

pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let unauthorized = || ApiError::Unauthorized("Unauthorized".into());

    let header = headers.get(header::AUTHORIZATION).ok_or_else(unauthorized)?;
    let header = header.to_str().map_err(|_| unauthorized())?;
    let token = header.strip_prefix("Bearer ").ok_or_else(unauthorized)?.trim();
    if token.is_empty() {
        return Err(unauthorized());
    }
    Ok(token)
}
