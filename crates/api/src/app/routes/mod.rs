use axum::{
    Router,
    http::Method,
    routing::{get, post, put},
};

use storefront_auth::Role;

use crate::metadata::{RouteMetadata, RouteTable};

pub mod auth;
pub mod products;
pub mod system;
pub mod tenants;
pub mod users;

/// Router for every endpoint behind the guard pipeline.
///
/// Routes are registered with their full paths so the matched pattern seen by
/// the guards is the one declared in [`route_table`].
pub fn router(admin_prefix: &str) -> Router {
    Router::new()
        .route("/tenant", get(system::current_tenant))
        .route("/auth/login", post(auth::login))
        .route("/users", get(users::public_info))
        .route("/users/profile", get(users::profile))
        .route("/users/admin", get(users::admin_only))
        .route("/users/super-admin", get(users::super_admin_only))
        .route("/users/staff", get(users::staff_only))
        .route("/products", get(products::list_products).post(products::create_product))
        .route("/products/stats", get(products::product_stats))
        .route("/products/bulk", post(products::bulk_create_products))
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .nest(admin_prefix, tenants::router())
}

/// Access metadata for every route in [`router`].
pub fn route_table(admin_prefix: &str) -> RouteTable {
    let admin_prefix = admin_prefix.trim_end_matches('/');
    let staff = || RouteMetadata::new().roles(&[Role::Staff]);

    RouteTable::new()
        .handler(Method::GET, "/tenant", RouteMetadata::new().public())
        .handler(Method::POST, "/auth/login", RouteMetadata::new().public())
        // users: authenticated by default, a few role-gated endpoints
        .group("/users", RouteMetadata::new())
        .handler(Method::GET, "/users", RouteMetadata::new().public())
        .handler(Method::GET, "/users/admin", RouteMetadata::new().roles(&[Role::Admin]))
        .handler(Method::GET, "/users/super-admin", RouteMetadata::new().roles(&[Role::SuperAdmin]))
        .handler(Method::GET, "/users/staff", staff())
        // platform administration
        .group(admin_prefix, RouteMetadata::new().roles(&[Role::SuperAdmin]))
        // catalogue: any customer reads, staff writes, admins delete
        .group("/products", RouteMetadata::new().roles(&[Role::Customer]))
        .handler(Method::GET, "/products/stats", staff())
        .handler(Method::POST, "/products", staff())
        .handler(Method::POST, "/products/bulk", staff())
        .handler(Method::PUT, "/products/:id", staff())
        .handler(Method::DELETE, "/products/:id", RouteMetadata::new().roles(&[Role::Admin]))
}
