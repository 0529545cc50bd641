//! Service wiring: store backend, tenant directory, authentication.

use std::sync::Arc;

use thiserror::Error;

use storefront_auth::{BcryptHasher, Hs256Authenticator};
use storefront_infra::{
    AuthError, AuthService, DirectoryError, InMemoryStore, PostgresStore, SharedStore, StoreError,
    TenantDirectory, TenantService,
};

use crate::config::Config;
use crate::metadata::RouteTable;

use super::{routes, seed};

const POSTGRES_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("seeding tenants failed: {0}")]
    Directory(#[from] DirectoryError),

    #[error("seeding users failed: {0}")]
    Auth(#[from] AuthError),
}

/// Everything a request handler or guard may need, shared behind one `Arc`.
pub struct AppServices {
    pub config: Config,
    /// Raw backend. Handlers never use it directly for tenant-owned data;
    /// they go through `ScopedDb`.
    pub store: SharedStore,
    pub directory: Arc<dyn TenantDirectory>,
    pub auth: AuthService,
    pub routes: RouteTable,
}

impl AppServices {
    /// Wire services over an already-selected backend.
    pub fn with_store(config: Config, store: SharedStore) -> Self {
        let directory: Arc<dyn TenantDirectory> = Arc::new(TenantService::new(Arc::clone(&store)));
        let auth = AuthService::new(
            Arc::clone(&store),
            Arc::new(BcryptHasher::new(config.bcrypt_cost)),
            Arc::new(Hs256Authenticator::new(config.jwt_secret.as_bytes())),
            config.jwt_ttl,
        );
        let routes = routes::route_table(&config.admin_path_prefix);

        Self {
            config,
            store,
            directory,
            auth,
            routes,
        }
    }
}

pub async fn select_store(config: &Config) -> Result<SharedStore, StoreError> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, POSTGRES_MAX_CONNECTIONS).await?;
            store.ensure_schema().await?;
            tracing::info!("using postgres store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("DATABASE_URL not set; using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

pub async fn build_services(config: Config) -> Result<AppServices, BootstrapError> {
    let store = select_store(&config).await?;
    let services = AppServices::with_store(config, store);

    if services.config.seed_demo_data {
        seed::seed_demo_data(services.directory.as_ref(), &services.auth).await?;
    }
    Ok(services)
}
