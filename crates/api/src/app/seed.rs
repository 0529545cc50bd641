//! Demo tenants and users for local development.

use serde_json::json;

use storefront_auth::Role;
use storefront_core::{NewDomain, NewTenant, TenantStatus};
use storefront_infra::{AuthService, TenantDirectory};

use super::services::BootstrapError;

pub const DEMO_PASSWORD: &str = "admin123";

fn domain(host: &str, is_primary: bool) -> NewDomain {
    NewDomain {
        domain: host.to_string(),
        is_primary,
        is_custom: false,
    }
}

fn demo_tenants() -> Vec<NewTenant> {
    vec![
        NewTenant {
            name: "Demo Store".into(),
            slug: "demo-store".into(),
            status: TenantStatus::Active,
            domains: vec![domain("localhost", true), domain("demo-store.local", false)],
            plan: None,
            settings: Some(json!({
                "theme": {
                    "primaryColor": "#3B82F6",
                    "secondaryColor": "#10B981",
                    "accentColor": "#F59E0B",
                    "fontFamily": "Inter, sans-serif"
                },
                "features": {"enableReviews": true, "enableWishlist": true, "enableComparisons": false},
                "contact": {
                    "email": "info@demo-store.com",
                    "phone": "+1 (555) 123-4567",
                    "address": "123 Main St, Anytown, USA"
                }
            })),
        },
        NewTenant {
            name: "Test Store".into(),
            slug: "test-store".into(),
            status: TenantStatus::Active,
            domains: vec![domain("test-store.local", true)],
            plan: None,
            settings: Some(json!({
                "theme": {
                    "primaryColor": "#8B5CF6",
                    "secondaryColor": "#EC4899",
                    "accentColor": "#F97316",
                    "fontFamily": "Roboto, sans-serif"
                },
                "features": {"enableReviews": true, "enableWishlist": false, "enableComparisons": true},
                "contact": {"email": "info@test-store.com"}
            })),
        },
    ]
}

/// Seed only into an empty store. Returns whether anything was written.
pub async fn seed_demo_data(directory: &dyn TenantDirectory, auth: &AuthService) -> Result<bool, BootstrapError> {
    if !directory.find_all().await?.is_empty() || auth.users().count().await? > 0 {
        tracing::debug!("store already populated; skipping demo seed");
        return Ok(false);
    }

    let mut tenants = Vec::new();
    for t in demo_tenants() {
        tenants.push(directory.create(t).await?);
    }
    let (demo, test) = (tenants[0].id, tenants[1].id);

    let users = [
        ("superadmin@storefront-processor.com", Role::SuperAdmin, None, "Super", "Admin"),
        ("admin@demo-store.com", Role::Admin, Some(demo), "Admin", "User"),
        ("staff@demo-store.com", Role::Staff, Some(demo), "Staff", "User"),
        ("customer@demo-store.com", Role::Customer, Some(demo), "Customer", "User"),
        ("admin@test-store.com", Role::Admin, Some(test), "Test", "Admin"),
        ("customer@test-store.com", Role::Customer, Some(test), "Test", "Customer"),
    ];
    let user_count = users.len();
    for (email, role, tenant_id, first, last) in users {
        auth.register_user(email, DEMO_PASSWORD, role, tenant_id, Some(first.into()), Some(last.into()))
            .await?;
    }

    tracing::info!(tenants = tenants.len(), users = user_count, "seeded demo data");
    Ok(true)
}
