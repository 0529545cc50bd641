//! User accounts.
//!
//! Users live in the `users` collection, which is exempt from tenant scoping:
//! login looks them up across tenants and super-admins belong to none. The
//! same email may exist once per tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storefront_auth::{Principal, Role};
use storefront_core::{TenantId, UserId};

use crate::store::{DataStore, DataStoreExt, Filter, Page, StoreError};

pub const USERS: &str = "users";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    /// bcrypt hash.
    pub password: String,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl core::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl UserRecord {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            tenant_id: self.tenant_id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserRepository<S> {
    store: S,
}

impl<S: DataStore> UserRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Every account registered under `email`, across all tenants.
    pub async fn find_by_email(&self, email: &str) -> Result<Vec<UserRecord>, StoreError> {
        let documents = self
            .store
            .find_many(USERS, Filter::eq("email", normalize_email(email)), Page::default())
            .await?;
        documents.into_iter().map(decode).collect()
    }

    pub async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        self.store
            .find_unique(USERS, Filter::eq("id", id.to_string()))
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let email = normalize_email(&user.email);
        let tenant = match user.tenant_id {
            Some(t) => Value::String(t.to_string()),
            None => Value::Null,
        };
        let taken = self
            .store
            .find_first(USERS, Filter::eq("email", email.as_str()).and_eq("tenantId", tenant))
            .await?;
        if taken.is_some() {
            return Err(StoreError::Conflict {
                collection: USERS.to_string(),
                detail: format!("user {email} already exists for this tenant"),
            });
        }

        let record = UserRecord {
            id: UserId::new(),
            email,
            password: user.password_hash,
            role: user.role,
            tenant_id: user.tenant_id,
            first_name: user.first_name,
            last_name: user.last_name,
            is_email_verified: false,
            created_at: Utc::now(),
        };
        let document = match serde_json::to_value(&record).map_err(|e| StoreError::decode(USERS, e))? {
            Value::Object(document) => document,
            _ => return Err(StoreError::decode(USERS, "user did not serialize to an object")),
        };
        self.store.create(USERS, document).await?;
        Ok(record)
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        self.store.count(USERS, Filter::all()).await
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn decode(document: crate::store::Document) -> Result<UserRecord, StoreError> {
    serde_json::from_value(Value::Object(document)).map_err(|e| StoreError::decode(USERS, e))
}
