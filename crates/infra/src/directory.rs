//! Tenant directory: authoritative lookup of tenants by hostname, id and slug,
//! plus the administrative mutations.
//!
//! Tenants and their hostnames live in the `tenants` and `domains`
//! collections, both exempt from tenant scoping. There is no cache: a status
//! change is visible to the very next lookup.
//!
//! Slug and hostname uniqueness are checked before writing. Mutations are
//! serialized through one lock so two writers in this process cannot both pass
//! the check; the Postgres schema carries matching unique indexes for writers
//! in other processes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;

use storefront_core::{
    Domain, DomainError, DomainId, NewDomain, NewTenant, Tenant, TenantId, TenantPatch, TenantStatus,
    normalize_hostname,
};

use crate::store::{DataStore, DataStoreExt, Document, Filter, Page, StoreError};

pub const TENANTS: &str = "tenants";
pub const DOMAINS: &str = "domains";

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// By-id / by-slug miss. The message names the missing key.
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[async_trait::async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Exact hostname lookup. A miss is `Ok(None)`, not an error.
    async fn find_by_domain(&self, hostname: &str) -> Result<Option<Tenant>, DirectoryError>;
    async fn find_by_id(&self, id: TenantId) -> Result<Tenant, DirectoryError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Tenant, DirectoryError>;
    async fn find_all(&self) -> Result<Vec<Tenant>, DirectoryError>;
    async fn create(&self, tenant: NewTenant) -> Result<Tenant, DirectoryError>;
    async fn update(&self, id: TenantId, patch: TenantPatch) -> Result<Tenant, DirectoryError>;
    async fn update_status(&self, id: TenantId, status: TenantStatus) -> Result<Tenant, DirectoryError>;
    /// Soft delete. Returns the tenant as it was before deletion.
    async fn delete(&self, id: TenantId) -> Result<Tenant, DirectoryError>;
}

/// Stored shape of a tenant (domains live in their own collection).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TenantRow {
    id: TenantId,
    slug: String,
    name: String,
    status: TenantStatus,
    #[serde(default)]
    plan: Option<String>,
    #[serde(default)]
    settings: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    deleted_at: Option<DateTime<Utc>>,
}

impl TenantRow {
    fn into_tenant(self, domains: Vec<Domain>) -> Tenant {
        Tenant {
            id: self.id,
            slug: self.slug,
            name: self.name,
            status: self.status,
            plan: self.plan,
            settings: self.settings,
            domains,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

fn to_document<T: Serialize>(collection: &str, value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value).map_err(|e| StoreError::decode(collection, e))? {
        Value::Object(document) => Ok(document),
        other => Err(StoreError::decode(collection, format!("expected object, got {other}"))),
    }
}

fn from_document<T: DeserializeOwned>(collection: &str, document: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(document)).map_err(|e| StoreError::decode(collection, e))
}

fn not_found_by_id(id: TenantId) -> DirectoryError {
    DirectoryError::NotFound(format!("Tenant with ID {id} not found"))
}

fn slug_conflict(slug: &str) -> DirectoryError {
    DirectoryError::Conflict(format!("Tenant with slug {slug} already exists"))
}

/// A unique-index violation on `domains` is the same conflict the directory
/// check reports.
fn host_conflict(err: StoreError) -> DirectoryError {
    match err {
        StoreError::Conflict { .. } => {
            DirectoryError::Conflict("Domain is already bound to another tenant".to_string())
        }
        other => other.into(),
    }
}

/// [`TenantDirectory`] over any [`DataStore`].
#[derive(Debug, Clone)]
pub struct TenantService<S> {
    store: S,
    writes: Arc<Mutex<()>>,
}

impl<S: DataStore> TenantService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Live (not soft-deleted) rows matching `filter`.
    async fn live_rows(&self, filter: Filter) -> Result<Vec<TenantRow>, DirectoryError> {
        let documents = self.store.find_many(TENANTS, filter, Page::default()).await?;
        let mut rows = Vec::with_capacity(documents.len());
        for document in documents {
            let row: TenantRow = from_document(TENANTS, document)?;
            if row.deleted_at.is_none() {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    async fn row_where(&self, filter: Filter) -> Result<Option<TenantRow>, DirectoryError> {
        Ok(self.live_rows(filter).await?.into_iter().next())
    }

    /// Whether a live tenant other than `owner` already uses `slug`.
    async fn slug_taken(&self, slug: &str, owner: Option<TenantId>) -> Result<bool, DirectoryError> {
        let rows = self.live_rows(Filter::eq("slug", slug)).await?;
        Ok(rows.iter().any(|row| Some(row.id) != owner))
    }

    async fn domains_of(&self, id: TenantId) -> Result<Vec<Domain>, DirectoryError> {
        let documents = self
            .store
            .find_many(DOMAINS, Filter::eq("tenantId", id.to_string()), Page::default())
            .await?;
        documents
            .into_iter()
            .map(|d| from_document(DOMAINS, d).map_err(DirectoryError::from))
            .collect()
    }

    async fn hydrate(&self, row: TenantRow) -> Result<Tenant, DirectoryError> {
        let domains = self.domains_of(row.id).await?;
        Ok(row.into_tenant(domains))
    }

    /// Reject hostnames already bound to some other tenant.
    async fn ensure_hosts_free(&self, domains: &[NewDomain], owner: Option<TenantId>) -> Result<(), DirectoryError> {
        for d in domains {
            let existing = self.store.find_first(DOMAINS, Filter::eq("domain", d.domain.as_str())).await?;
            if let Some(existing) = existing {
                let existing: Domain = from_document(DOMAINS, existing)?;
                if Some(existing.tenant_id) != owner {
                    return Err(DirectoryError::Conflict(format!(
                        "Domain {} is already bound to another tenant",
                        d.domain
                    )));
                }
            }
        }
        Ok(())
    }

    async fn bind_domains(
        &self,
        tenant_id: TenantId,
        domains: Vec<NewDomain>,
        now: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        if domains.is_empty() {
            return Ok(());
        }
        let documents = domains
            .into_iter()
            .map(|d| {
                let domain = Domain {
                    id: DomainId::new(),
                    domain: d.domain,
                    is_primary: d.is_primary,
                    is_custom: d.is_custom,
                    tenant_id,
                    created_at: now,
                };
                to_document(DOMAINS, &domain)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.store.create_many(DOMAINS, documents).await.map_err(host_conflict)?;
        Ok(())
    }

    async fn replace_domains(&self, tenant_id: TenantId, domains: Vec<NewDomain>) -> Result<(), DirectoryError> {
        self.store.delete_many(DOMAINS, Filter::eq("tenantId", tenant_id.to_string())).await?;
        self.bind_domains(tenant_id, domains, Utc::now()).await
    }

    /// Put back the fields in `patched` and the domain set of `previous`.
    async fn roll_back_update(
        &self,
        previous: &Tenant,
        patched: &Document,
        domains_changed: bool,
    ) -> Result<(), DirectoryError> {
        let snapshot = to_document(TENANTS, previous)?;
        let fields: Document = patched
            .keys()
            .map(|key| (key.clone(), snapshot.get(key).cloned().unwrap_or(Value::Null)))
            .collect();
        self.patch_row(previous.id, fields).await?;

        if domains_changed {
            self.store
                .delete_many(DOMAINS, Filter::eq("tenantId", previous.id.to_string()))
                .await?;
            if !previous.domains.is_empty() {
                let documents = previous
                    .domains
                    .iter()
                    .map(|d| to_document(DOMAINS, d))
                    .collect::<Result<Vec<_>, _>>()?;
                self.store.create_many(DOMAINS, documents).await?;
            }
        }
        Ok(())
    }

    async fn patch_row(&self, id: TenantId, mut patch: Document) -> Result<(), DirectoryError> {
        patch.insert("updatedAt".into(), serde_json::to_value(Utc::now()).map_err(|e| StoreError::decode(TENANTS, e))?);
        self.store
            .update(TENANTS, Filter::eq("id", id.to_string()), patch)
            .await?
            .ok_or_else(|| not_found_by_id(id))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: DataStore> TenantDirectory for TenantService<S> {
    #[instrument(skip(self), err)]
    async fn find_by_domain(&self, hostname: &str) -> Result<Option<Tenant>, DirectoryError> {
        let host = normalize_hostname(hostname);
        let Some(domain) = self.store.find_first(DOMAINS, Filter::eq("domain", host)).await? else {
            return Ok(None);
        };
        let domain: Domain = from_document(DOMAINS, domain)?;
        match self.row_where(Filter::eq("id", domain.tenant_id.to_string())).await? {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: TenantId) -> Result<Tenant, DirectoryError> {
        let row = self
            .row_where(Filter::eq("id", id.to_string()))
            .await?
            .ok_or_else(|| not_found_by_id(id))?;
        self.hydrate(row).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Tenant, DirectoryError> {
        let row = self
            .row_where(Filter::eq("slug", slug))
            .await?
            .ok_or_else(|| DirectoryError::NotFound(format!("Tenant with slug {slug} not found")))?;
        self.hydrate(row).await
    }

    async fn find_all(&self) -> Result<Vec<Tenant>, DirectoryError> {
        let rows = self.live_rows(Filter::all()).await?;
        let mut tenants = Vec::with_capacity(rows.len());
        for row in rows {
            tenants.push(self.hydrate(row).await?);
        }
        Ok(tenants)
    }

    #[instrument(skip(self, tenant), fields(slug = %tenant.slug), err)]
    async fn create(&self, tenant: NewTenant) -> Result<Tenant, DirectoryError> {
        let tenant = tenant.validate()?;
        let _writing = self.writes.lock().await;

        if self.slug_taken(&tenant.slug, None).await? {
            return Err(slug_conflict(&tenant.slug));
        }
        self.ensure_hosts_free(&tenant.domains, None).await?;

        let now = Utc::now();
        let row = TenantRow {
            id: TenantId::new(),
            slug: tenant.slug,
            name: tenant.name,
            status: tenant.status,
            plan: tenant.plan,
            settings: tenant.settings.unwrap_or_else(|| Value::Object(Default::default())),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.store
            .create(TENANTS, to_document(TENANTS, &row)?)
            .await
            .map_err(|e| match e {
                StoreError::Conflict { .. } => slug_conflict(&row.slug),
                other => other.into(),
            })?;
        if let Err(e) = self.bind_domains(row.id, tenant.domains, now).await {
            // No tenant without its hostnames.
            if let Err(cleanup) = self.store.delete(TENANTS, Filter::eq("id", row.id.to_string())).await {
                tracing::error!(tenant_id = %row.id, error = %cleanup, "could not remove half-created tenant");
            }
            return Err(e);
        }

        tracing::info!(tenant_id = %row.id, "tenant created");
        self.hydrate(row).await
    }

    #[instrument(skip(self, patch), err)]
    async fn update(&self, id: TenantId, patch: TenantPatch) -> Result<Tenant, DirectoryError> {
        let _writing = self.writes.lock().await;
        let current = self.find_by_id(id).await?;
        let patch = patch.validate()?;

        if let Some(slug) = &patch.slug {
            if self.slug_taken(slug, Some(id)).await? {
                return Err(slug_conflict(slug));
            }
        }
        if let Some(domains) = &patch.domains {
            self.ensure_hosts_free(domains, Some(id)).await?;
        }

        let mut fields = Document::new();
        if let Some(name) = patch.name {
            fields.insert("name".into(), Value::String(name));
        }
        if let Some(slug) = patch.slug {
            fields.insert("slug".into(), Value::String(slug));
        }
        if let Some(status) = patch.status {
            fields.insert("status".into(), Value::String(status.as_str().into()));
        }
        if let Some(plan) = patch.plan {
            fields.insert("plan".into(), Value::String(plan));
        }
        if let Some(settings) = patch.settings {
            fields.insert("settings".into(), settings);
        }

        // Fields first, then domains; a failed domain swap undoes both.
        self.patch_row(id, fields.clone()).await.map_err(|e| match e {
            DirectoryError::Store(StoreError::Conflict { .. }) if fields.contains_key("slug") => {
                slug_conflict(fields["slug"].as_str().unwrap_or_default())
            }
            other => other,
        })?;
        if let Some(domains) = patch.domains {
            if let Err(e) = self.replace_domains(id, domains).await {
                if let Err(rollback) = self.roll_back_update(&current, &fields, true).await {
                    tracing::error!(tenant_id = %id, error = %rollback, "could not roll back failed tenant update");
                }
                return Err(e);
            }
        }
        self.find_by_id(id).await
    }

    #[instrument(skip(self), err)]
    async fn update_status(&self, id: TenantId, status: TenantStatus) -> Result<Tenant, DirectoryError> {
        let _writing = self.writes.lock().await;
        let current = self.find_by_id(id).await?;
        let mut fields = Document::new();
        fields.insert("status".into(), Value::String(status.as_str().into()));
        self.patch_row(id, fields).await?;

        tracing::info!(tenant_id = %id, from = %current.status, to = %status, "tenant status changed");
        self.find_by_id(id).await
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, id: TenantId) -> Result<Tenant, DirectoryError> {
        let _writing = self.writes.lock().await;
        let current = self.find_by_id(id).await?;

        let mut fields = Document::new();
        fields.insert("status".into(), Value::String(TenantStatus::Inactive.as_str().into()));
        fields.insert(
            "deletedAt".into(),
            serde_json::to_value(Utc::now()).map_err(|e| StoreError::decode(TENANTS, e))?,
        );
        self.patch_row(id, fields).await?;
        // Hostnames are released so they can be bound again.
        self.store.delete_many(DOMAINS, Filter::eq("tenantId", id.to_string())).await?;

        tracing::info!(tenant_id = %id, "tenant soft-deleted");
        Ok(current)
    }
}
