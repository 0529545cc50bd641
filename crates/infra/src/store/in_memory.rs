use std::collections::HashMap;
use std::sync::RwLock;

use super::{
    DataStore, Document, Filter, ID_FIELD, Operation, Outcome, StoreError, aggregate_documents,
    ensure_id, group_documents, id_key, merge_into,
};

/// In-memory document store for tests/dev.
///
/// Collections keep insertion order, which is also the order reads return.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<HashMap<String, Vec<Document>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

fn insert(collection: &str, rows: &mut Vec<Document>, mut data: Document) -> Result<Document, StoreError> {
    let id = ensure_id(&mut data);
    let taken = rows
        .iter()
        .any(|r| r.get(ID_FIELD).and_then(id_key).as_deref() == Some(id.as_str()));
    if taken {
        return Err(StoreError::Conflict {
            collection: collection.to_string(),
            detail: format!("id '{id}' already exists"),
        });
    }
    rows.push(data.clone());
    Ok(data)
}

fn first_match(rows: &[Document], filter: &Filter) -> Option<usize> {
    rows.iter().position(|r| filter.matches(r))
}

#[async_trait::async_trait]
impl DataStore for InMemoryStore {
    async fn execute(&self, collection: &str, operation: Operation) -> Result<Outcome, StoreError> {
        if let Operation::FindUnique { filter }
        | Operation::FindFirst { filter }
        | Operation::FindMany { filter, .. }
        | Operation::Count { filter }
        | Operation::Aggregate { filter, .. }
        | Operation::GroupBy { filter, .. } = &operation
        {
            let map = self.inner.read().map_err(|_| poisoned())?;
            let rows: &[Document] = map.get(collection).map(Vec::as_slice).unwrap_or(&[]);
            let matching = rows.iter().filter(|r| filter.matches(r));

            return Ok(match &operation {
                Operation::FindMany { page, .. } => {
                    let skipped = matching.skip(page.offset).cloned();
                    Outcome::Records(match page.limit {
                        Some(limit) => skipped.take(limit).collect(),
                        None => skipped.collect(),
                    })
                }
                Operation::Count { .. } => Outcome::Count(matching.count() as u64),
                Operation::Aggregate { field, function, .. } => {
                    Outcome::Aggregate(aggregate_documents(matching, field, *function))
                }
                Operation::GroupBy { by, .. } => Outcome::Groups(group_documents(matching, by)),
                _ => Outcome::Record(matching.cloned().next()),
            });
        }

        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let rows = map.entry(collection.to_string()).or_default();

        let outcome = match operation {
            Operation::Create { data } => Outcome::Record(Some(insert(collection, rows, data)?)),
            Operation::CreateMany { data } => {
                // All-or-nothing: validate ids against a scratch copy first.
                let mut staged = rows.clone();
                let count = data.len() as u64;
                for d in data {
                    insert(collection, &mut staged, d)?;
                }
                *rows = staged;
                Outcome::Affected(count)
            }
            Operation::Update { filter, data } => match first_match(rows, &filter) {
                Some(i) => {
                    merge_into(&mut rows[i], &data);
                    Outcome::Record(Some(rows[i].clone()))
                }
                None => Outcome::Record(None),
            },
            Operation::UpdateMany { filter, data } => {
                let mut n = 0;
                for r in rows.iter_mut().filter(|r| filter.matches(r)) {
                    merge_into(r, &data);
                    n += 1;
                }
                Outcome::Affected(n)
            }
            Operation::Upsert { filter, create, update } => match first_match(rows, &filter) {
                Some(i) => {
                    merge_into(&mut rows[i], &update);
                    Outcome::Record(Some(rows[i].clone()))
                }
                None => Outcome::Record(Some(insert(collection, rows, create)?)),
            },
            Operation::Delete { filter } => match first_match(rows, &filter) {
                Some(i) => Outcome::Record(Some(rows.remove(i))),
                None => Outcome::Record(None),
            },
            Operation::DeleteMany { filter } => {
                let before = rows.len();
                rows.retain(|r| !filter.matches(r));
                Outcome::Affected((before - rows.len()) as u64)
            }
            Operation::FindUnique { .. }
            | Operation::FindFirst { .. }
            | Operation::FindMany { .. }
            | Operation::Count { .. }
            | Operation::Aggregate { .. }
            | Operation::GroupBy { .. } => unreachable!("reads are answered above"),
        };
        Ok(outcome)
    }
}
