use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role assigned to a principal.
///
/// Roles form a containment hierarchy
/// `SUPER_ADMIN ⊇ ADMIN ⊇ STAFF ⊇ CUSTOMER`: a higher role holds every
/// capability of the roles below it. The containment is spelled out in
/// [`Role::grants`] rather than derived from declaration order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Admin,
    Staff,
    Customer,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 4] = [Role::SuperAdmin, Role::Admin, Role::Staff, Role::Customer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Admin => "ADMIN",
            Role::Staff => "STAFF",
            Role::Customer => "CUSTOMER",
        }
    }

    /// Permission set of this role: itself plus every role it dominates.
    pub fn grants(self) -> &'static [Role] {
        match self {
            Role::SuperAdmin => &[Role::SuperAdmin, Role::Admin, Role::Staff, Role::Customer],
            Role::Admin => &[Role::Admin, Role::Staff, Role::Customer],
            Role::Staff => &[Role::Staff, Role::Customer],
            Role::Customer => &[Role::Customer],
        }
    }

    /// `true` when holding `self` implies holding `other`.
    pub fn dominates(self, other: Role) -> bool {
        self.grants().contains(&other)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}
