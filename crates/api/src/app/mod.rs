//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: store selection, tenant directory, authentication
//! - `routes/`: HTTP handlers, one file per area, plus the route access table
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses
//! - `seed.rs`: demo tenants and users

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::{authz, middleware};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod seed;
pub mod services;

pub use services::{AppServices, BootstrapError};

/// Router over already-built services.
///
/// Guard order, outermost first: tenant resolution, authentication, tenant
/// guard, role guard. `/health` sits outside the pipeline so probes work on
/// any hostname.
pub fn router(services: Arc<AppServices>) -> Router {
    let pipeline = ServiceBuilder::new()
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&services),
            middleware::resolve_tenant,
        ))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&services),
            middleware::authenticate,
        ))
        .layer(axum::middleware::from_fn_with_state(Arc::clone(&services), authz::tenant_guard))
        .layer(axum::middleware::from_fn_with_state(Arc::clone(&services), authz::role_guard));

    let guarded = routes::router(&services.config.admin_path_prefix)
        .layer(pipeline)
        .layer(Extension(services));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(guarded)
        .layer(TraceLayer::new_for_http())
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: Config) -> Result<Router, BootstrapError> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router(services))
}
