//! Postgres-backed document store.
//!
//! Every collection lives in one `records` table keyed by `(collection, id)`,
//! with the document itself in a JSONB `body` column. Equality filters map onto
//! JSONB containment (`body @> filter`), which the GIN index serves.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any | `Backend` |
//! | PoolClosed / other | N/A | `Backend` |

use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use super::{
    DataStore, Document, Filter, ID_FIELD, Operation, Outcome, Page, StoreError, aggregate_documents,
    ensure_id, group_documents,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS records (
        seq BIGSERIAL PRIMARY KEY,
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        body JSONB NOT NULL,
        UNIQUE (collection, id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS records_body_idx ON records USING GIN (body jsonb_path_ops)",
    // Directory invariants, enforced here as well so that concurrent writers
    // on separate connections cannot both pass the directory's own check.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS records_domains_hostname_key
        ON records ((body->>'domain'))
        WHERE collection = 'domains'
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS records_tenants_live_slug_key
        ON records ((body->>'slug'))
        WHERE collection = 'tenants' AND body->>'deletedAt' IS NULL
    "#,
];

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", "records", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the backing table and index if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", "records", e))?;
        }
        Ok(())
    }

    async fn select(&self, collection: &str, filter: &Filter, page: Page) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM records
            WHERE collection = $1 AND body @> $2
            ORDER BY seq ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(collection)
        .bind(filter_value(filter))
        .bind(page.limit.map(|l| l as i64))
        .bind(page.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("select", collection, e))?;

        rows.iter().map(|row| body_of(collection, row)).collect()
    }

    async fn count_rows(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM records WHERE collection = $1 AND body @> $2")
            .bind(collection)
            .bind(filter_value(filter))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count", collection, e))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| StoreError::decode(collection, e))?;
        Ok(n as u64)
    }

    async fn create_many(&self, collection: &str, data: Vec<Document>) -> Result<u64, StoreError> {
        let mut tx = self.begin(collection).await?;
        let count = data.len() as u64;
        for document in data {
            insert(&mut tx, collection, document).await?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("createMany", collection, e))?;
        Ok(count)
    }

    async fn update_first(&self, collection: &str, filter: &Filter, patch: &Document) -> Result<Option<Document>, StoreError> {
        let mut tx = self.begin(collection).await?;
        let updated = update_first_in(&mut tx, collection, filter, patch).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("update", collection, e))?;
        Ok(updated)
    }

    async fn update_all(&self, collection: &str, filter: &Filter, patch: &Document) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE records SET body = body || $3 WHERE collection = $1 AND body @> $2")
            .bind(collection)
            .bind(filter_value(filter))
            .bind(patch_value(patch))
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("updateMany", collection, e))?;
        Ok(result.rows_affected())
    }

    async fn upsert(
        &self,
        collection: &str,
        filter: &Filter,
        create: Document,
        update: &Document,
    ) -> Result<Document, StoreError> {
        let mut tx = self.begin(collection).await?;
        let record = match update_first_in(&mut tx, collection, filter, update).await? {
            Some(updated) => updated,
            None => insert(&mut tx, collection, create).await?,
        };
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("upsert", collection, e))?;
        Ok(record)
    }

    async fn delete_first(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            r#"
            DELETE FROM records WHERE seq = (
                SELECT seq FROM records
                WHERE collection = $1 AND body @> $2
                ORDER BY seq ASC
                LIMIT 1
            )
            RETURNING body
            "#,
        )
        .bind(collection)
        .bind(filter_value(filter))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete", collection, e))?;

        row.as_ref().map(|r| body_of(collection, r)).transpose()
    }

    async fn delete_all(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = $1 AND body @> $2")
            .bind(collection)
            .bind(filter_value(filter))
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("deleteMany", collection, e))?;
        Ok(result.rows_affected())
    }

    async fn begin(&self, collection: &str) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", collection, e))
    }
}

#[async_trait::async_trait]
impl DataStore for PostgresStore {
    #[instrument(skip(self, operation), fields(operation = operation.name()), err)]
    async fn execute(&self, collection: &str, operation: Operation) -> Result<Outcome, StoreError> {
        let outcome = match operation {
            Operation::FindUnique { filter } | Operation::FindFirst { filter } => {
                let mut rows = self.select(collection, &filter, Page::new(Some(1), 0)).await?;
                Outcome::Record(rows.pop())
            }
            Operation::FindMany { filter, page } => Outcome::Records(self.select(collection, &filter, page).await?),
            Operation::Count { filter } => Outcome::Count(self.count_rows(collection, &filter).await?),
            Operation::Aggregate { filter, field, function } => {
                let rows = self.select(collection, &filter, Page::default()).await?;
                Outcome::Aggregate(aggregate_documents(rows.iter(), &field, function))
            }
            Operation::GroupBy { filter, by } => {
                let rows = self.select(collection, &filter, Page::default()).await?;
                Outcome::Groups(group_documents(rows.iter(), &by))
            }
            Operation::Create { data } => {
                let mut tx = self.begin(collection).await?;
                let record = insert(&mut tx, collection, data).await?;
                tx.commit()
                    .await
                    .map_err(|e| map_sqlx_error("create", collection, e))?;
                Outcome::Record(Some(record))
            }
            Operation::CreateMany { data } => Outcome::Affected(self.create_many(collection, data).await?),
            Operation::Update { filter, data } => Outcome::Record(self.update_first(collection, &filter, &data).await?),
            Operation::UpdateMany { filter, data } => {
                Outcome::Affected(self.update_all(collection, &filter, &data).await?)
            }
            Operation::Upsert { filter, create, update } => {
                Outcome::Record(Some(self.upsert(collection, &filter, create, &update).await?))
            }
            Operation::Delete { filter } => Outcome::Record(self.delete_first(collection, &filter).await?),
            Operation::DeleteMany { filter } => Outcome::Affected(self.delete_all(collection, &filter).await?),
        };
        Ok(outcome)
    }
}

async fn insert(
    tx: &mut Transaction<'static, Postgres>,
    collection: &str,
    mut data: Document,
) -> Result<Document, StoreError> {
    let id = ensure_id(&mut data);
    let row = sqlx::query("INSERT INTO records (collection, id, body) VALUES ($1, $2, $3) RETURNING body")
        .bind(collection)
        .bind(&id)
        .bind(Value::Object(data))
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert", collection, e))?;
    body_of(collection, &row)
}

async fn update_first_in(
    tx: &mut Transaction<'static, Postgres>,
    collection: &str,
    filter: &Filter,
    patch: &Document,
) -> Result<Option<Document>, StoreError> {
    let row = sqlx::query(
        r#"
        UPDATE records SET body = body || $3 WHERE seq = (
            SELECT seq FROM records
            WHERE collection = $1 AND body @> $2
            ORDER BY seq ASC
            LIMIT 1
            FOR UPDATE
        )
        RETURNING body
        "#,
    )
    .bind(collection)
    .bind(filter_value(filter))
    .bind(patch_value(patch))
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update", collection, e))?;

    row.as_ref().map(|r| body_of(collection, r)).transpose()
}

fn filter_value(filter: &Filter) -> Value {
    Value::Object(filter.as_document().clone())
}

/// Patch without the primary key, which never changes after create.
fn patch_value(patch: &Document) -> Value {
    Value::Object(
        patch
            .iter()
            .filter(|(field, _)| field.as_str() != ID_FIELD)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

fn body_of(collection: &str, row: &PgRow) -> Result<Document, StoreError> {
    let body: Value = row
        .try_get("body")
        .map_err(|e| StoreError::decode(collection, e))?;
    match body {
        Value::Object(document) => Ok(document),
        other => Err(StoreError::decode(collection, format!("expected object, got {other}"))),
    }
}

fn map_sqlx_error(operation: &str, collection: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict {
                    collection: collection.to_string(),
                    detail: msg,
                },
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_never_carries_the_primary_key() {
        let patch = match json!({"id": "other", "name": "x"}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        assert_eq!(patch_value(&patch), json!({"name": "x"}));
    }

    #[test]
    fn empty_filter_contains_everything() {
        assert_eq!(filter_value(&Filter::all()), json!({}));
        assert_eq!(filter_value(&Filter::eq("tenantId", "t1")), json!({"tenantId": "t1"}));
    }

    #[test]
    fn schema_guards_hostnames_and_live_slugs() {
        let ddl = SCHEMA.join("\n");
        assert!(ddl.contains("UNIQUE INDEX IF NOT EXISTS records_domains_hostname_key"));
        assert!(ddl.contains("WHERE collection = 'tenants' AND body->>'deletedAt' IS NULL"));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a scratch Postgres"]
    async fn round_trips_against_a_live_database() {
        use crate::store::DataStoreExt;

        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let store = PostgresStore::connect(&url, 2).await.unwrap();
        store.ensure_schema().await.unwrap();

        let collection = format!("test_{}", uuid::Uuid::now_v7().simple());
        let created = store
            .create(&collection, match json!({"sku": "a", "price": 3}) {
                Value::Object(m) => m,
                _ => unreachable!(),
            })
            .await
            .unwrap();
        let found = store
            .find_first(&collection, Filter::eq("sku", "a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["id"], created["id"]);
        assert_eq!(store.delete_many(&collection, Filter::all()).await.unwrap(), 1);
    }
}
