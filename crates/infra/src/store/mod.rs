//! Generic persistence backend.
//!
//! Records are JSON objects living in named collections. Every read and write
//! goes through [`DataStore::execute`] as an [`Operation`], which is what lets
//! [`TenantScopedStore`] rewrite operations before they reach storage.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod in_memory;
pub mod postgres;
pub mod scoped;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use scoped::{EXEMPT_COLLECTIONS, ScopeError, TenantScopedStore};

/// A stored record.
pub type Document = Map<String, Value>;

/// Field every tenant-owned record carries.
pub const TENANT_FIELD: &str = "tenantId";

/// Primary key field, assigned on create when absent. Immutable afterwards.
pub const ID_FIELD: &str = "id";

/// Backend shared across the application.
pub type SharedStore = Arc<dyn DataStore>;

// ─────────────────────────────────────────────────────────────────────────────
// Query model
// ─────────────────────────────────────────────────────────────────────────────

/// Conjunction of field constraints.
///
/// A constraint holds when the record's field *contains* the expected value,
/// with the same meaning as Postgres JSONB `@>`: scalars compare by value,
/// objects match on the listed keys, arrays match when every expected element
/// is contained in some element of the record's array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Document);

impl Filter {
    /// Matches every record.
    pub fn all() -> Self {
        Self(Map::new())
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(field, value)
    }

    /// AND one more equality constraint in. Replaces an existing constraint on
    /// the same field.
    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn matches(&self, record: &Document) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| record.get(field).is_some_and(|v| contains(v, expected)))
    }
}

impl From<Document> for Filter {
    fn from(value: Document) -> Self {
        Self(value)
    }
}

/// JSONB containment. Numbers compare by value (`10` contains `10.0`).
fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(key, e)| actual.get(key).is_some_and(|a| contains(a, e))),
        (Value::Array(actual), Value::Array(expected)) => {
            expected.iter().all(|e| actual.iter().any(|a| contains(a, e)))
        }
        _ => actual == expected,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl Page {
    pub fn new(limit: Option<usize>, offset: usize) -> Self {
        Self { limit, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// Operation categories the backend supports.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    FindUnique { filter: Filter },
    FindFirst { filter: Filter },
    FindMany { filter: Filter, page: Page },
    Count { filter: Filter },
    Aggregate { filter: Filter, field: String, function: AggregateFn },
    GroupBy { filter: Filter, by: Vec<String> },
    Create { data: Document },
    CreateMany { data: Vec<Document> },
    Update { filter: Filter, data: Document },
    UpdateMany { filter: Filter, data: Document },
    Upsert { filter: Filter, create: Document, update: Document },
    Delete { filter: Filter },
    DeleteMany { filter: Filter },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::FindUnique { .. } => "findUnique",
            Operation::FindFirst { .. } => "findFirst",
            Operation::FindMany { .. } => "findMany",
            Operation::Count { .. } => "count",
            Operation::Aggregate { .. } => "aggregate",
            Operation::GroupBy { .. } => "groupBy",
            Operation::Create { .. } => "create",
            Operation::CreateMany { .. } => "createMany",
            Operation::Update { .. } => "update",
            Operation::UpdateMany { .. } => "updateMany",
            Operation::Upsert { .. } => "upsert",
            Operation::Delete { .. } => "delete",
            Operation::DeleteMany { .. } => "deleteMany",
        }
    }

    pub fn filter(&self) -> Option<&Filter> {
        match self {
            Operation::FindUnique { filter }
            | Operation::FindFirst { filter }
            | Operation::FindMany { filter, .. }
            | Operation::Count { filter }
            | Operation::Aggregate { filter, .. }
            | Operation::GroupBy { filter, .. }
            | Operation::Update { filter, .. }
            | Operation::UpdateMany { filter, .. }
            | Operation::Upsert { filter, .. }
            | Operation::Delete { filter }
            | Operation::DeleteMany { filter } => Some(filter),
            Operation::Create { .. } | Operation::CreateMany { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub key: Document,
    pub count: u64,
}

/// Result of an [`Operation`]. The variant is determined by the operation kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Record(Option<Document>),
    Records(Vec<Document>),
    Count(u64),
    Aggregate(Option<f64>),
    Groups(Vec<Group>),
    Affected(u64),
}

impl Outcome {
    fn kind(&self) -> &'static str {
        match self {
            Outcome::Record(_) => "record",
            Outcome::Records(_) => "records",
            Outcome::Count(_) => "count",
            Outcome::Aggregate(_) => "aggregate",
            Outcome::Groups(_) => "groups",
            Outcome::Affected(_) => "affected",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record conflicts with an existing one in '{collection}': {detail}")]
    Conflict { collection: String, detail: String },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("record in '{collection}' could not be decoded: {detail}")]
    Decode { collection: String, detail: String },

    #[error("backend returned {got} for {operation}")]
    UnexpectedOutcome { operation: &'static str, got: &'static str },
}

impl StoreError {
    pub fn decode(collection: &str, detail: impl ToString) -> Self {
        Self::Decode {
            collection: collection.to_string(),
            detail: detail.to_string(),
        }
    }
}

#[async_trait::async_trait]
pub trait DataStore: Send + Sync {
    async fn execute(&self, collection: &str, operation: Operation) -> Result<Outcome, StoreError>;
}

#[async_trait::async_trait]
impl<S> DataStore for Arc<S>
where
    S: DataStore + ?Sized,
{
    async fn execute(&self, collection: &str, operation: Operation) -> Result<Outcome, StoreError> {
        (**self).execute(collection, operation).await
    }
}

#[async_trait::async_trait]
impl<S> DataStore for &S
where
    S: DataStore + ?Sized,
{
    async fn execute(&self, collection: &str, operation: Operation) -> Result<Outcome, StoreError> {
        (**self).execute(collection, operation).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed helpers
// ─────────────────────────────────────────────────────────────────────────────

fn unexpected(operation: &'static str, got: Outcome) -> StoreError {
    StoreError::UnexpectedOutcome {
        operation,
        got: got.kind(),
    }
}

/// Convenience wrappers over [`DataStore::execute`], one per operation.
#[async_trait::async_trait]
pub trait DataStoreExt: DataStore {
    async fn find_unique(&self, collection: &str, filter: Filter) -> Result<Option<Document>, StoreError> {
        match self.execute(collection, Operation::FindUnique { filter }).await? {
            Outcome::Record(r) => Ok(r),
            other => Err(unexpected("findUnique", other)),
        }
    }

    async fn find_first(&self, collection: &str, filter: Filter) -> Result<Option<Document>, StoreError> {
        match self.execute(collection, Operation::FindFirst { filter }).await? {
            Outcome::Record(r) => Ok(r),
            other => Err(unexpected("findFirst", other)),
        }
    }

    async fn find_many(&self, collection: &str, filter: Filter, page: Page) -> Result<Vec<Document>, StoreError> {
        match self.execute(collection, Operation::FindMany { filter, page }).await? {
            Outcome::Records(r) => Ok(r),
            other => Err(unexpected("findMany", other)),
        }
    }

    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        match self.execute(collection, Operation::Count { filter }).await? {
            Outcome::Count(n) => Ok(n),
            other => Err(unexpected("count", other)),
        }
    }

    async fn aggregate(
        &self,
        collection: &str,
        filter: Filter,
        field: &str,
        function: AggregateFn,
    ) -> Result<Option<f64>, StoreError> {
        let op = Operation::Aggregate {
            filter,
            field: field.to_string(),
            function,
        };
        match self.execute(collection, op).await? {
            Outcome::Aggregate(v) => Ok(v),
            other => Err(unexpected("aggregate", other)),
        }
    }

    async fn group_by(&self, collection: &str, filter: Filter, by: Vec<String>) -> Result<Vec<Group>, StoreError> {
        match self.execute(collection, Operation::GroupBy { filter, by }).await? {
            Outcome::Groups(g) => Ok(g),
            other => Err(unexpected("groupBy", other)),
        }
    }

    async fn create(&self, collection: &str, data: Document) -> Result<Document, StoreError> {
        match self.execute(collection, Operation::Create { data }).await? {
            Outcome::Record(Some(r)) => Ok(r),
            other => Err(unexpected("create", other)),
        }
    }

    async fn create_many(&self, collection: &str, data: Vec<Document>) -> Result<u64, StoreError> {
        match self.execute(collection, Operation::CreateMany { data }).await? {
            Outcome::Affected(n) => Ok(n),
            other => Err(unexpected("createMany", other)),
        }
    }

    async fn update(&self, collection: &str, filter: Filter, data: Document) -> Result<Option<Document>, StoreError> {
        match self.execute(collection, Operation::Update { filter, data }).await? {
            Outcome::Record(r) => Ok(r),
            other => Err(unexpected("update", other)),
        }
    }

    async fn update_many(&self, collection: &str, filter: Filter, data: Document) -> Result<u64, StoreError> {
        match self.execute(collection, Operation::UpdateMany { filter, data }).await? {
            Outcome::Affected(n) => Ok(n),
            other => Err(unexpected("updateMany", other)),
        }
    }

    async fn upsert(
        &self,
        collection: &str,
        filter: Filter,
        create: Document,
        update: Document,
    ) -> Result<Document, StoreError> {
        match self.execute(collection, Operation::Upsert { filter, create, update }).await? {
            Outcome::Record(Some(r)) => Ok(r),
            other => Err(unexpected("upsert", other)),
        }
    }

    async fn delete(&self, collection: &str, filter: Filter) -> Result<Option<Document>, StoreError> {
        match self.execute(collection, Operation::Delete { filter }).await? {
            Outcome::Record(r) => Ok(r),
            other => Err(unexpected("delete", other)),
        }
    }

    async fn delete_many(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        match self.execute(collection, Operation::DeleteMany { filter }).await? {
            Outcome::Affected(n) => Ok(n),
            other => Err(unexpected("deleteMany", other)),
        }
    }
}

impl<S: DataStore + ?Sized> DataStoreExt for S {}

// ─────────────────────────────────────────────────────────────────────────────
// Shared evaluation helpers (used by every backend)
// ─────────────────────────────────────────────────────────────────────────────

/// Shallow-merge `patch` into `record`. The primary key is never overwritten.
pub(crate) fn merge_into(record: &mut Document, patch: &Document) {
    for (field, value) in patch {
        if field == ID_FIELD {
            continue;
        }
        record.insert(field.clone(), value.clone());
    }
}

/// Primary key of a stored value in its canonical string form. `None` for
/// null or empty keys.
pub(crate) fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(id) if id.is_empty() => None,
        Value::String(id) => Some(id.clone()),
        other => Some(other.to_string()),
    }
}

/// Ensure `data` carries a primary key, returning it.
pub(crate) fn ensure_id(data: &mut Document) -> String {
    match data.get(ID_FIELD).and_then(id_key) {
        Some(id) => id,
        None => {
            let id = uuid::Uuid::now_v7().to_string();
            data.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
    }
}

pub(crate) fn aggregate_documents<'a>(
    records: impl Iterator<Item = &'a Document>,
    field: &str,
    function: AggregateFn,
) -> Option<f64> {
    let values: Vec<f64> = records
        .filter_map(|r| r.get(field))
        .filter_map(Value::as_f64)
        .collect();

    match function {
        AggregateFn::Count => Some(values.len() as f64),
        _ if values.is_empty() => None,
        AggregateFn::Sum => Some(values.iter().sum()),
        AggregateFn::Avg => Some(values.iter().sum::<f64>() / values.len() as f64),
        AggregateFn::Min => values.iter().copied().reduce(f64::min),
        AggregateFn::Max => values.iter().copied().reduce(f64::max),
    }
}

/// Groups in first-seen order. Missing fields group under `null`.
pub(crate) fn group_documents<'a>(records: impl Iterator<Item = &'a Document>, by: &[String]) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    for record in records {
        let key: Document = by
            .iter()
            .map(|f| (f.clone(), record.get(f).cloned().unwrap_or(Value::Null)))
            .collect();
        match groups.iter_mut().find(|g| g.key == key) {
            Some(g) => g.count += 1,
            None => groups.push(Group { key, count: 1 }),
        }
    }
    groups
}
