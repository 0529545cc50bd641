//! Role hierarchy evaluator.
//!
//! - No IO
//! - No panics
//! - No business logic (pure policy check)

use serde::Serialize;
use thiserror::Error;

use crate::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("forbidden: role {role} does not satisfy any of {}", format_roles(.required))]
pub struct AccessDenied {
    pub role: Role,
    pub required: Vec<Role>,
}

fn format_roles(roles: &[Role]) -> String {
    let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
    format!("[{}]", names.join(", "))
}

/// Decide whether `role` may access a route gated by `required`.
///
/// An empty requirement set admits everyone. Otherwise the role's permission
/// set (itself plus every role it dominates) must intersect `required`.
pub fn is_permitted(role: Role, required: &[Role]) -> bool {
    required.is_empty() || required.iter().any(|r| role.dominates(*r))
}

pub fn authorize(role: Role, required: &[Role]) -> Result<(), AccessDenied> {
    if is_permitted(role, required) {
        Ok(())
    } else {
        Err(AccessDenied {
            role,
            required: required.to_vec(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// Answers "why was this request allowed/denied?" for logs and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationExplanation {
    pub role: Role,
    pub required: Vec<Role>,
    pub granted: bool,
    /// Roles implied by `role` (including itself).
    pub effective_roles: Vec<Role>,
    /// The required role that granted access, if any.
    pub matched: Option<Role>,
    pub reason: String,
}

pub fn explain_authorization(role: Role, required: &[Role]) -> AuthorizationExplanation {
    let effective_roles = role.grants().to_vec();

    if required.is_empty() {
        return AuthorizationExplanation {
            role,
            required: Vec::new(),
            granted: true,
            effective_roles,
            matched: None,
            reason: "route declares no required roles".to_string(),
        };
    }

    let matched = required.iter().copied().find(|r| role.dominates(*r));
    let reason = match matched {
        Some(r) if r == role => format!("principal holds required role {r}"),
        Some(r) => format!("role {role} inherits required role {r}"),
        None => format!(
            "role {role} grants {} which does not intersect {}",
            format_roles(&effective_roles),
            format_roles(required)
        ),
    };

    AuthorizationExplanation {
        role,
        required: required.to_vec(),
        granted: matched.is_some(),
        effective_roles,
        matched,
        reason,
    }
}
