//! Tenant-scoped data access.
//!
//! [`TenantScopedStore`] wraps any [`DataStore`] and rewrites every operation
//! on a tenant-owned collection so it can only see or produce records of one
//! tenant:
//!
//! - reads, updates and deletes get `tenantId = <bound>` ANDed into the filter
//! - creates get `tenantId` stamped onto the payload (each item for bulk create)
//!   and lose any caller-chosen `id`, so the store always assigns a fresh key
//!   and a collision can never reveal a record of another tenant
//! - update payloads lose any `tenantId`, so a record never moves between tenants
//! - upsert gets all of the above (filter, create branch, update branch)
//!
//! The bound tenant always wins. A caller-supplied `tenantId` that disagrees is
//! overwritten and logged at `warn`.
//!
//! Collections in [`EXEMPT_COLLECTIONS`] are platform-level and pass through
//! unchanged.

use serde_json::Value;
use storefront_core::TenantId;
use thiserror::Error;

use super::{DataStore, Document, Filter, ID_FIELD, Operation, Outcome, StoreError, TENANT_FIELD};
use crate::tenant_context;

/// Collections that are not tenant-owned.
pub const EXEMPT_COLLECTIONS: [&str; 3] = ["tenants", "domains", "users"];

pub fn is_exempt(collection: &str) -> bool {
    EXEMPT_COLLECTIONS.contains(&collection)
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    #[error("tenant-scoped data access requires a tenant id")]
    MissingTenant,
}

/// A [`DataStore`] bound to exactly one tenant.
#[derive(Debug, Clone)]
pub struct TenantScopedStore<S> {
    inner: S,
    tenant_id: TenantId,
}

impl<S: DataStore> TenantScopedStore<S> {
    /// Bind `inner` to `tenant_id`. Fails fast when there is no tenant (or the
    /// nil id), instead of building a store that would run unscoped.
    pub fn new(inner: S, tenant_id: Option<TenantId>) -> Result<Self, ScopeError> {
        match tenant_id {
            Some(tenant_id) if !tenant_id.is_nil() => Ok(Self { inner, tenant_id }),
            _ => Err(ScopeError::MissingTenant),
        }
    }

    /// Bind to the tenant of the current request context.
    pub fn from_context(inner: S) -> Result<Self, ScopeError> {
        Self::new(inner, tenant_context::current_tenant_id())
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Rewrite `operation` for a tenant-owned collection.
    pub fn rewrite(&self, operation: Operation) -> Operation {
        let op = operation.name();
        match operation {
            Operation::FindUnique { filter } => Operation::FindUnique { filter: self.scope_filter(op, filter) },
            Operation::FindFirst { filter } => Operation::FindFirst { filter: self.scope_filter(op, filter) },
            Operation::FindMany { filter, page } => Operation::FindMany {
                filter: self.scope_filter(op, filter),
                page,
            },
            Operation::Count { filter } => Operation::Count { filter: self.scope_filter(op, filter) },
            Operation::Aggregate { filter, field, function } => Operation::Aggregate {
                filter: self.scope_filter(op, filter),
                field,
                function,
            },
            Operation::GroupBy { filter, by } => Operation::GroupBy {
                filter: self.scope_filter(op, filter),
                by,
            },
            Operation::Create { data } => Operation::Create { data: self.fresh(op, data) },
            Operation::CreateMany { data } => Operation::CreateMany {
                data: data.into_iter().map(|d| self.fresh(op, d)).collect(),
            },
            Operation::Update { filter, data } => Operation::Update {
                filter: self.scope_filter(op, filter),
                data: self.strip(op, data),
            },
            Operation::UpdateMany { filter, data } => Operation::UpdateMany {
                filter: self.scope_filter(op, filter),
                data: self.strip(op, data),
            },
            Operation::Upsert { filter, create, update } => Operation::Upsert {
                filter: self.scope_filter(op, filter),
                create: self.fresh(op, create),
                // Re-stamp so the row keeps its tenant after the merge.
                update: self.stamp(op, update),
            },
            Operation::Delete { filter } => Operation::Delete { filter: self.scope_filter(op, filter) },
            Operation::DeleteMany { filter } => Operation::DeleteMany { filter: self.scope_filter(op, filter) },
        }
    }

    fn tenant_value(&self) -> Value {
        Value::String(self.tenant_id.to_string())
    }

    fn scope_filter(&self, op: &str, mut filter: Filter) -> Filter {
        let bound = self.tenant_value();
        if let Some(previous) = filter.insert(TENANT_FIELD, bound.clone()) {
            self.warn_on_conflict(op, &previous, &bound);
        }
        filter
    }

    fn stamp(&self, op: &str, mut data: Document) -> Document {
        let bound = self.tenant_value();
        if let Some(previous) = data.insert(TENANT_FIELD.to_string(), bound.clone()) {
            self.warn_on_conflict(op, &previous, &bound);
        }
        data
    }

    /// Payload of a new record: stamped, with the key left to the store.
    fn fresh(&self, op: &str, mut data: Document) -> Document {
        if let Some(id) = data.remove(ID_FIELD) {
            tracing::debug!(operation = op, supplied_id = %id, "caller-supplied id dropped on create");
        }
        self.stamp(op, data)
    }

    fn strip(&self, op: &str, mut data: Document) -> Document {
        if let Some(previous) = data.remove(TENANT_FIELD) {
            self.warn_on_conflict(op, &previous, &self.tenant_value());
        }
        data
    }

    fn warn_on_conflict(&self, op: &str, supplied: &Value, bound: &Value) {
        if supplied != bound {
            tracing::warn!(
                operation = op,
                bound_tenant = %self.tenant_id,
                supplied_tenant = %supplied,
                "caller-supplied tenantId overridden by bound tenant"
            );
        }
    }
}

#[async_trait::async_trait]
impl<S: DataStore> DataStore for TenantScopedStore<S> {
    async fn execute(&self, collection: &str, operation: Operation) -> Result<Outcome, StoreError> {
        if is_exempt(collection) {
            return self.inner.execute(collection, operation).await;
        }
        let rewritten = self.rewrite(operation);
        tracing::trace!(collection, operation = rewritten.name(), tenant_id = %self.tenant_id, "scoped operation");
        self.inner.execute(collection, rewritten).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AggregateFn, DataStoreExt, InMemoryStore, Page};
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn scoped(store: &Arc<InMemoryStore>, tenant: TenantId) -> TenantScopedStore<Arc<InMemoryStore>> {
        TenantScopedStore::new(Arc::clone(store), Some(tenant)).unwrap()
    }

    #[test]
    fn absent_or_nil_tenant_fails_fast() {
        let store = InMemoryStore::new();
        assert_eq!(
            TenantScopedStore::new(&store as &dyn DataStore, None).err(),
            Some(ScopeError::MissingTenant)
        );
        assert!(TenantScopedStore::new(&store as &dyn DataStore, Some(TenantId::from_uuid(uuid::Uuid::nil()))).is_err());
        assert!(TenantScopedStore::from_context(&store as &dyn DataStore).is_err());
    }

    #[tokio::test]
    async fn from_context_binds_the_ambient_tenant() {
        let t = TenantId::new();
        let store = InMemoryStore::new();
        let bound = tenant_context::run(t, async { TenantScopedStore::from_context(&store as &dyn DataStore) })
            .await
            .unwrap();
        assert_eq!(bound.tenant_id(), t);
    }

    #[test]
    fn reads_get_tenant_constraint_anded_in() {
        let t = TenantId::new();
        let store = InMemoryStore::new();
        let s = TenantScopedStore::new(&store as &dyn DataStore, Some(t)).unwrap();

        let op = s.rewrite(Operation::FindMany {
            filter: Filter::eq("category", "shoes"),
            page: Page::default(),
        });
        let expected = Filter::eq("category", "shoes").and_eq(TENANT_FIELD, t.to_string());
        assert_eq!(op.filter(), Some(&expected));
    }

    #[test]
    fn bound_tenant_overrides_caller_values() {
        let (t, other) = (TenantId::new(), TenantId::new());
        let store = InMemoryStore::new();
        let s = TenantScopedStore::new(&store as &dyn DataStore, Some(t)).unwrap();

        match s.rewrite(Operation::Create {
            data: doc(json!({"name": "x", "tenantId": other.to_string()})),
        }) {
            Operation::Create { data } => assert_eq!(data[TENANT_FIELD], t.to_string()),
            other => panic!("unexpected {other:?}"),
        }

        match s.rewrite(Operation::Count {
            filter: Filter::eq(TENANT_FIELD, other.to_string()),
        }) {
            Operation::Count { filter } => assert_eq!(filter.get(TENANT_FIELD), Some(&json!(t.to_string()))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn update_payload_loses_tenant_and_upsert_restamps() {
        let (t, other) = (TenantId::new(), TenantId::new());
        let store = InMemoryStore::new();
        let s = TenantScopedStore::new(&store as &dyn DataStore, Some(t)).unwrap();

        match s.rewrite(Operation::UpdateMany {
            filter: Filter::all(),
            data: doc(json!({"price": 1, "tenantId": other.to_string()})),
        }) {
            Operation::UpdateMany { data, .. } => assert!(!data.contains_key(TENANT_FIELD)),
            other => panic!("unexpected {other:?}"),
        }

        match s.rewrite(Operation::Upsert {
            filter: Filter::eq("sku", "a"),
            create: doc(json!({"sku": "a"})),
            update: doc(json!({"tenantId": other.to_string()})),
        }) {
            Operation::Upsert { filter, create, update } => {
                assert_eq!(filter.get(TENANT_FIELD), Some(&json!(t.to_string())));
                assert_eq!(create[TENANT_FIELD], t.to_string());
                assert_eq!(update[TENANT_FIELD], t.to_string());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn exempt_collections_pass_through() {
        let store = Arc::new(InMemoryStore::new());
        let s = scoped(&store, TenantId::new());

        let created = s.create("tenants", doc(json!({"slug": "acme"}))).await.unwrap();
        assert!(!created.contains_key(TENANT_FIELD));
        store.create("users", doc(json!({"email": "a@b.c", "tenantId": "elsewhere"}))).await.unwrap();
        assert_eq!(s.count("users", Filter::all()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bulk_create_stamps_every_item() {
        let t = TenantId::new();
        let store = Arc::new(InMemoryStore::new());
        let s = scoped(&store, t);

        let n = s
            .create_many(
                "products",
                vec![doc(json!({"name": "a"})), doc(json!({"name": "b"})), doc(json!({"name": "c"}))],
            )
            .await
            .unwrap();
        assert_eq!(n, 3);

        let raw = store.find_many("products", Filter::all(), Page::default()).await.unwrap();
        assert_eq!(raw.len(), 3);
        assert!(raw.iter().all(|r| r[TENANT_FIELD] == t.to_string()));
    }

    #[tokio::test]
    async fn tenants_never_see_each_others_records() {
        let (a, b) = (TenantId::new(), TenantId::new());
        let store = Arc::new(InMemoryStore::new());
        let (sa, sb) = (scoped(&store, a), scoped(&store, b));

        let mine = sa.create("products", doc(json!({"sku": "x", "price": 10}))).await.unwrap();
        sb.create("products", doc(json!({"sku": "x", "price": 99}))).await.unwrap();

        assert_eq!(sa.count("products", Filter::all()).await.unwrap(), 1);
        assert_eq!(
            sa.aggregate("products", Filter::all(), "price", AggregateFn::Sum).await.unwrap(),
            Some(10.0)
        );

        // B cannot reach A's record by id, even when naming A explicitly.
        let by_id = Filter::eq("id", mine["id"].clone()).and_eq(TENANT_FIELD, a.to_string());
        assert!(sb.find_unique("products", by_id.clone()).await.unwrap().is_none());
        assert!(sb.update("products", by_id.clone(), doc(json!({"price": 0}))).await.unwrap().is_none());
        assert!(sb.delete("products", by_id).await.unwrap().is_none());

        assert_eq!(sb.delete_many("products", Filter::all()).await.unwrap(), 1);
        assert_eq!(store.count("products", Filter::all()).await.unwrap(), 1);

        let groups = sa.group_by("products", Filter::all(), vec!["sku".into()]).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count, 1);
    }

    #[tokio::test]
    async fn updates_cannot_move_a_record_to_another_tenant() {
        let (a, b) = (TenantId::new(), TenantId::new());
        let store = Arc::new(InMemoryStore::new());
        let sa = scoped(&store, a);

        sa.create("products", doc(json!({"sku": "x"}))).await.unwrap();
        let updated = sa
            .update(
                "products",
                Filter::eq("sku", "x"),
                doc(json!({"name": "moved?", "tenantId": b.to_string()})),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated[TENANT_FIELD], a.to_string());
        assert_eq!(updated["name"], "moved?");
    }

    #[tokio::test]
    async fn caller_chosen_ids_reveal_nothing_across_tenants() {
        let (a, b) = (TenantId::new(), TenantId::new());
        let store = Arc::new(InMemoryStore::new());
        let (sa, sb) = (scoped(&store, a), scoped(&store, b));

        let mine = sa.create("products", doc(json!({"name": "A's"}))).await.unwrap();
        let taken = mine["id"].clone();

        // Reusing A's key from B behaves exactly like an unused key.
        let reused = sb.create("products", doc(json!({"id": taken.clone(), "name": "B's"}))).await.unwrap();
        let unused = sb.create("products", doc(json!({"id": "no-such-id", "name": "B's"}))).await.unwrap();
        assert_ne!(reused["id"], taken);
        assert_ne!(unused["id"], json!("no-such-id"));

        let n = sb
            .create_many("products", vec![doc(json!({"id": taken.clone(), "name": "bulk"}))])
            .await
            .unwrap();
        assert_eq!(n, 1);

        let upserted = sb
            .upsert(
                "products",
                Filter::eq("sku", "new"),
                doc(json!({"id": taken.clone(), "sku": "new"})),
                doc(json!({"price": 1})),
            )
            .await
            .unwrap();
        assert_ne!(upserted["id"], taken);

        let original = sa.find_unique("products", Filter::eq("id", taken)).await.unwrap().unwrap();
        assert_eq!(original["name"], "A's");
        assert_eq!(sb.count("products", Filter::all()).await.unwrap(), 4);
    }

    fn any_document() -> impl Strategy<Value = Document> {
        prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 0..5).prop_map(|m| {
            m.into_iter().map(|(k, v)| (k, Value::String(v))).collect()
        })
    }

    proptest! {
        #[test]
        fn every_filtered_operation_is_bound_to_the_tenant(
            fields in any_document(),
            supplied in prop::option::of("[a-z0-9-]{1,12}"),
        ) {
            let t = TenantId::new();
            let store = InMemoryStore::new();
            let s = TenantScopedStore::new(&store as &dyn DataStore, Some(t)).unwrap();

            let mut filter = Filter::from(fields.clone());
            if let Some(v) = supplied {
                filter.insert(TENANT_FIELD, v);
            }

            for op in [
                Operation::FindFirst { filter: filter.clone() },
                Operation::Count { filter: filter.clone() },
                Operation::Update { filter: filter.clone(), data: fields.clone() },
                Operation::DeleteMany { filter: filter.clone() },
            ] {
                let rewritten = s.rewrite(op);
                let scoped = rewritten.filter().unwrap();
                prop_assert_eq!(scoped.get(TENANT_FIELD), Some(&json!(t.to_string())));
                for (k, v) in &fields {
                    if k != TENANT_FIELD {
                        prop_assert_eq!(scoped.get(k), Some(v));
                    }
                }
            }
        }

        #[test]
        fn stamped_payload_keeps_caller_fields(data in any_document()) {
            let t = TenantId::new();
            let store = InMemoryStore::new();
            let s = TenantScopedStore::new(&store as &dyn DataStore, Some(t)).unwrap();

            match s.rewrite(Operation::Create { data: data.clone() }) {
                Operation::Create { data: stamped } => {
                    let kept = data.len() - usize::from(data.contains_key(ID_FIELD));
                    prop_assert_eq!(stamped.len(), kept + usize::from(!data.contains_key(TENANT_FIELD)));
                    prop_assert!(!stamped.contains_key(ID_FIELD));
                    prop_assert_eq!(&stamped[TENANT_FIELD], &json!(t.to_string()));
                }
                _ => prop_assert!(false),
            }
        }
    }
}
