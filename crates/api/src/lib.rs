//! HTTP API: multi-tenant storefront server.
//!
//! Every request passes through tenant resolution (hostname to tenant), then
//! the authentication, tenant and role guards, before reaching a handler.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod metadata;
pub mod middleware;

pub use app::build_app;
pub use config::Config;
