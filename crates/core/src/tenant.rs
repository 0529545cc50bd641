//! Tenant and domain records: the entities that define the tenant boundary.
//!
//! Tenants are owned by the platform. They are created and mutated through
//! administrative operations only and are soft-deleted (`deleted_at`) rather
//! than physically removed, since tenant-scoped data keeps referencing them.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};
use crate::id::{DomainId, TenantId};

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle status of a tenant. Only `Active` tenants serve storefront traffic.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    Active,
    Suspended,
    Inactive,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "ACTIVE",
            TenantStatus::Suspended => "SUSPENDED",
            TenantStatus::Inactive => "INACTIVE",
        }
    }
}

impl Default for TenantStatus {
    fn default() -> Self {
        TenantStatus::Active
    }
}

impl core::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(TenantStatus::Active),
            "SUSPENDED" => Ok(TenantStatus::Suspended),
            "INACTIVE" => Ok(TenantStatus::Inactive),
            other => Err(DomainError::validation(format!(
                "unknown tenant status '{other}' (expected ACTIVE, SUSPENDED or INACTIVE)"
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// A hostname bound to exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: DomainId,
    pub domain: String,
    pub is_primary: bool,
    pub is_custom: bool,
    pub tenant_id: TenantId,
    pub created_at: DateTime<Utc>,
}

/// An isolated customer organization (unit of data partitioning).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: TenantId,
    pub slug: String,
    pub name: String,
    pub status: TenantStatus,
    #[serde(default)]
    pub plan: Option<String>,
    /// Opaque settings document (theme/features/contact), validated on write.
    #[serde(default)]
    pub settings: Value,
    #[serde(default)]
    pub domains: Vec<Domain>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active && self.deleted_at.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn primary_domain(&self) -> Option<&Domain> {
        self.domains.iter().find(|d| d.is_primary)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Write models (validated at the boundary)
// ─────────────────────────────────────────────────────────────────────────────

/// Hostname binding requested on tenant create/update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDomain {
    pub domain: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub is_custom: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTenant {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub status: TenantStatus,
    #[serde(default)]
    pub domains: Vec<NewDomain>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub settings: Option<Value>,
}

impl NewTenant {
    /// Validate and normalize (hostnames lowercased, names trimmed).
    pub fn validate(mut self) -> DomainResult<Self> {
        self.name = validate_name(&self.name)?;
        self.slug = validate_slug(&self.slug)?;
        self.domains = validate_domains(self.domains)?;
        if let Some(settings) = &self.settings {
            TenantSettings::validate(settings)?;
        }
        Ok(self)
    }
}

/// Partial update. `domains`, when present, replaces the tenant's domain set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub status: Option<TenantStatus>,
    #[serde(default)]
    pub domains: Option<Vec<NewDomain>>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub settings: Option<Value>,
}

impl TenantPatch {
    pub fn validate(mut self) -> DomainResult<Self> {
        if let Some(name) = &self.name {
            self.name = Some(validate_name(name)?);
        }
        if let Some(slug) = &self.slug {
            self.slug = Some(validate_slug(slug)?);
        }
        if let Some(domains) = self.domains.take() {
            self.domains = Some(validate_domains(domains)?);
        }
        if let Some(settings) = &self.settings {
            TenantSettings::validate(settings)?;
        }
        Ok(self)
    }
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name must not be empty"));
    }
    Ok(name.to_string())
}

fn validate_slug(slug: &str) -> DomainResult<String> {
    let slug = slug.trim();
    let well_formed = !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !well_formed {
        return Err(DomainError::validation(format!(
            "slug '{slug}' must be lowercase letters, digits and inner hyphens"
        )));
    }
    Ok(slug.to_string())
}

fn validate_domains(domains: Vec<NewDomain>) -> DomainResult<Vec<NewDomain>> {
    let mut seen: Vec<String> = Vec::with_capacity(domains.len());
    let mut primaries = 0usize;

    let mut out = Vec::with_capacity(domains.len());
    for d in domains {
        let host = normalize_hostname(&d.domain);
        if host.is_empty() || host.contains(['/', ' ', ':', '*']) {
            return Err(DomainError::validation(format!(
                "'{}' is not a valid hostname",
                d.domain
            )));
        }
        if seen.contains(&host) {
            return Err(DomainError::validation(format!("duplicate domain '{host}'")));
        }
        if d.is_primary {
            primaries += 1;
        }
        seen.push(host.clone());
        out.push(NewDomain {
            domain: host,
            ..d
        });
    }

    if primaries > 1 {
        return Err(DomainError::validation(
            "at most one domain per tenant may be primary",
        ));
    }
    Ok(out)
}

/// Canonical form of a hostname for lookup: trimmed, lowercase, no trailing dot.
///
/// Matching stays exact after normalization (no wildcard or subdomain rules).
pub fn normalize_hostname(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSettings {
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub accent_color: Option<String>,
    pub font_family: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSettings {
    pub enable_reviews: Option<bool>,
    pub enable_wishlist: Option<bool>,
    pub enable_comparisons: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSettings {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Typed view over the settings document.
///
/// Only the known sections are checked; anything else is carried through
/// untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantSettings {
    #[serde(default)]
    pub theme: Option<ThemeSettings>,
    #[serde(default)]
    pub features: Option<FeatureSettings>,
    #[serde(default)]
    pub contact: Option<ContactSettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TenantSettings {
    pub fn validate(value: &Value) -> DomainResult<TenantSettings> {
        if !value.is_object() {
            return Err(DomainError::validation("settings must be a JSON object"));
        }
        let settings: TenantSettings = serde_json::from_value(value.clone())
            .map_err(|e| DomainError::validation(format!("invalid settings: {e}")))?;

        if let Some(theme) = &settings.theme {
            for color in [
                &theme.primary_color,
                &theme.secondary_color,
                &theme.accent_color,
            ]
            .into_iter()
            .flatten()
            {
                if !is_hex_color(color) {
                    return Err(DomainError::validation(format!(
                        "theme color '{color}' must be a hex color like #3B82F6"
                    )));
                }
            }
        }
        Ok(settings)
    }
}

fn is_hex_color(s: &str) -> bool {
    match s.strip_prefix('#') {
        Some(hex) => matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
