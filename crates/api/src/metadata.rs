//! Declarative route metadata.
//!
//! Each route may declare whether it is public, whether it bypasses the tenant
//! check, and which roles it requires. Declarations live in a [`RouteTable`]
//! built at startup, at two levels: a group (path prefix) and a handler
//! (method + route pattern). For each field the handler-level declaration
//! wins over the group-level one.

use std::collections::HashMap;

use axum::http::Method;

use storefront_auth::Role;

/// Metadata as declared at one level. `None` means "not declared here".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMetadata {
    public: Option<bool>,
    bypass_tenant: Option<bool>,
    roles: Option<Vec<Role>>,
}

impl RouteMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exempt from authentication and tenant checks.
    pub fn public(mut self) -> Self {
        self.public = Some(true);
        self
    }

    /// Explicitly re-protect a route inside a public group.
    pub fn protected(mut self) -> Self {
        self.public = Some(false);
        self
    }

    pub fn bypass_tenant(mut self) -> Self {
        self.bypass_tenant = Some(true);
        self
    }

    pub fn roles(mut self, roles: &[Role]) -> Self {
        self.roles = Some(roles.to_vec());
        self
    }

    fn or(&self, fallback: Option<&RouteMetadata>) -> ResolvedMetadata {
        let fallback = fallback.cloned().unwrap_or_default();
        ResolvedMetadata {
            public: self.public.or(fallback.public).unwrap_or(false),
            bypass_tenant: self.bypass_tenant.or(fallback.bypass_tenant).unwrap_or(false),
            roles: self.roles.clone().or(fallback.roles).unwrap_or_default(),
        }
    }
}

/// Effective metadata for one route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMetadata {
    pub public: bool,
    pub bypass_tenant: bool,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    groups: Vec<(String, RouteMetadata)>,
    handlers: HashMap<(Method, String), RouteMetadata>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare metadata for every route under `prefix`.
    pub fn group(mut self, prefix: &str, metadata: RouteMetadata) -> Self {
        self.groups.push((prefix.trim_end_matches('/').to_string(), metadata));
        self
    }

    /// Declare metadata for one route, `path` being the pattern it was
    /// registered with (e.g. `/products/:id`).
    pub fn handler(mut self, method: Method, path: &str, metadata: RouteMetadata) -> Self {
        self.handlers.insert((method, path.to_string()), metadata);
        self
    }

    /// Longest declared group containing `path`.
    fn group_for(&self, path: &str) -> Option<&RouteMetadata> {
        self.groups
            .iter()
            .filter(|(prefix, _)| {
                path == prefix || path.strip_prefix(prefix.as_str()).is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, metadata)| metadata)
    }

    pub fn resolve(&self, method: &Method, path: &str) -> ResolvedMetadata {
        let group = self.group_for(path);
        match self.handlers.get(&(method.clone(), path.to_string())) {
            Some(handler) => handler.or(group),
            None => group.cloned().unwrap_or_default().or(None),
        }
    }
}
