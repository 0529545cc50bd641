//! `storefront-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model and the tenant/domain records that
//! define the multi-tenant boundary.

pub mod error;
pub mod id;
pub mod tenant;

pub use error::{DomainError, DomainResult};
pub use id::{DomainId, RecordId, TenantId, UserId};
pub use tenant::{
    Domain, NewDomain, NewTenant, Tenant, TenantPatch, TenantSettings, TenantStatus,
    normalize_hostname,
};
