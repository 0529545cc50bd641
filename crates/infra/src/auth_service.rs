//! Login and bearer-token resolution.
//!
//! bcrypt is deliberately slow, so every hash/compare runs on the blocking
//! pool rather than on a runtime worker.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use storefront_auth::{Authenticator, CredentialError, CredentialHasher, JwtClaims, Principal, Role, TokenError};
use storefront_core::{TenantId, UserId};

use crate::store::{SharedStore, StoreError};
use crate::users::{NewUser, UserRecord, UserRepository};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Well-formed token whose subject no longer exists.
    #[error("Invalid token")]
    InvalidToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("credential task failed: {0}")]
    Join(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<&UserRecord> for UserSummary {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            tenant_id: user.tenant_id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserSummary,
}

#[derive(Clone)]
pub struct AuthService {
    users: UserRepository<SharedStore>,
    hasher: Arc<dyn CredentialHasher>,
    authenticator: Arc<dyn Authenticator>,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(
        store: SharedStore,
        hasher: Arc<dyn CredentialHasher>,
        authenticator: Arc<dyn Authenticator>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            users: UserRepository::new(store),
            hasher,
            authenticator,
            token_ttl,
        }
    }

    pub fn users(&self) -> &UserRepository<SharedStore> {
        &self.users
    }

    /// The same email may be registered under several tenants; the first
    /// account whose password verifies wins.
    #[instrument(skip(self, password), err(level = "info"))]
    pub async fn validate_credentials(&self, email: &str, password: &str) -> Result<UserRecord, AuthError> {
        let candidates = self.users.find_by_email(email).await?;
        if candidates.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            candidates.into_iter().find(|user| match hasher.compare_password(&password, &user.password) {
                Ok(matched) => matched,
                Err(e) => {
                    tracing::warn!(user_id = %user.id, error = %e, "skipping account with unusable credential hash");
                    false
                }
            })
        })
        .await
        .map_err(|e| AuthError::Join(e.to_string()))?
        .ok_or(AuthError::InvalidCredentials)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let user = self.validate_credentials(email, password).await?;
        let claims = user.principal().claims(Utc::now(), self.token_ttl);
        let access_token = self.authenticator.sign(&claims)?;

        tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");
        Ok(LoginResponse {
            access_token,
            user: UserSummary::from(&user),
        })
    }

    /// Verify a bearer token and load the principal it names.
    pub async fn verify_token(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.authenticator.verify(token, Utc::now())?;
        self.principal_for(&claims).await
    }

    /// The stored user is authoritative: role and tenant come from the
    /// record, not from the (possibly stale) claims.
    pub async fn principal_for(&self, claims: &JwtClaims) -> Result<Principal, AuthError> {
        match self.users.find_by_id(claims.sub).await? {
            Some(user) => Ok(user.principal()),
            None => Err(AuthError::InvalidToken),
        }
    }

    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        role: Role,
        tenant_id: Option<TenantId>,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<UserRecord, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|e| AuthError::Join(e.to_string()))??;

        let user = self
            .users
            .create(NewUser {
                email: email.to_string(),
                password_hash,
                role,
                tenant_id,
                first_name,
                last_name,
            })
            .await?;
        Ok(user)
    }
}
