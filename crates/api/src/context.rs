use std::sync::Arc;

use storefront_auth::{Principal, Role};
use storefront_core::{Tenant, TenantId};

/// Tenant resolved from the request hostname.
///
/// Attached by the resolution middleware for synchronous access by the guards
/// and handlers. Store access goes through the ambient tenant instead.
#[derive(Debug, Clone)]
pub struct TenantContext {
    tenant: Arc<Tenant>,
}

impl TenantContext {
    pub fn new(tenant: Tenant) -> Self {
        Self {
            tenant: Arc::new(tenant),
        }
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant.id
    }
}

/// Principal context for a request (authenticated identity + role).
#[derive(Debug, Clone)]
pub struct PrincipalContext {
    principal: Arc<Principal>,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal: Arc::new(principal),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.principal.tenant_id
    }
}
