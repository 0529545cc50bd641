//! Request-scoped tenant context.
//!
//! The active tenant id is stored in a tokio task-local, so it travels with the
//! future that owns it: every `.await` inside [`run`] sees the same value, no
//! matter which worker thread polls it or how many other requests are
//! interleaved on that thread. A plain global (or thread-local) would leak
//! between interleaved requests; a task-local is re-installed on every poll of
//! its scope and removed again when the poll returns.
//!
//! ## Scoping rules
//!
//! - Nested scopes shadow outer ones and restore them on exit (stack discipline).
//! - Exit via `Err`, early return or panic restores the outer value as well.
//! - Spawned tasks do **not** inherit task-locals; use [`spawn`] to carry the
//!   current tenant into a new task.

use std::cell::Cell;
use std::future::Future;

use tokio::task::JoinHandle;

use storefront_core::TenantId;

tokio::task_local! {
    static CURRENT_TENANT: Cell<Option<TenantId>>;
}

/// Run `body` with `tenant_id` as the ambient tenant.
///
/// Errors produced by `body` are returned unchanged.
pub async fn run<F>(tenant_id: TenantId, body: F) -> F::Output
where
    F: Future,
{
    CURRENT_TENANT.scope(Cell::new(Some(tenant_id)), body).await
}

/// Synchronous counterpart of [`run`].
pub fn run_sync<R>(tenant_id: TenantId, body: impl FnOnce() -> R) -> R {
    CURRENT_TENANT.sync_scope(Cell::new(Some(tenant_id)), body)
}

/// The ambient tenant id, or `None` outside any scope. Never blocks.
pub fn current_tenant_id() -> Option<TenantId> {
    CURRENT_TENANT.try_with(Cell::get).ok().flatten()
}

/// Reset the innermost scope to "no tenant".
///
/// Diagnostic/test use only: request flow relies on scope exit instead. Outer
/// scopes are untouched and come back when the inner scope ends.
pub fn clear() {
    let _ = CURRENT_TENANT.try_with(|slot| slot.set(None));
}

/// Spawn `future` on the runtime, carrying the current tenant (if any) into it.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match current_tenant_id() {
        Some(tenant_id) => tokio::spawn(CURRENT_TENANT.scope(Cell::new(Some(tenant_id)), future)),
        None => tokio::spawn(future),
    }
}
