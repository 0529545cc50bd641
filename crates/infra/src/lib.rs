//! Infrastructure layer: request-scoped tenant context, persistence backends,
//! tenant-scoped data access, tenant directory and user accounts.

pub mod auth_service;
pub mod directory;
pub mod store;
pub mod tenant_context;
pub mod users;

pub use auth_service::{AuthError, AuthService, LoginResponse, UserSummary};
pub use directory::{DirectoryError, TenantDirectory, TenantService};
pub use store::{
    AggregateFn, DataStore, DataStoreExt, Document, EXEMPT_COLLECTIONS, Filter, Group, InMemoryStore,
    Operation, Outcome, Page, PostgresStore, ScopeError, SharedStore, StoreError, TenantScopedStore,
};
pub use users::{NewUser, UserRecord, UserRepository};
