use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{TenantId, UserId};

use crate::{JwtClaims, Role};

/// An authenticated user, as attached to a request after credential checks.
///
/// Never carries the credential hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Principal {
    /// Platform-level principals belong to no tenant.
    pub fn is_platform_level(&self) -> bool {
        self.tenant_id.is_none()
    }

    pub fn claims(&self, issued_at: DateTime<Utc>, ttl: Duration) -> JwtClaims {
        JwtClaims::new(self.id, self.email.clone(), self.role, self.tenant_id, issued_at, ttl)
    }
}
