use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{ Arc, Mutex, MutexGuard };

use crate::db::common::DataStore;
use crate::error::RepoResult;
use crate::models::{ Filter, Row };

/// In-memory implementation of the data store.
///
/// Rows keep their insertion order. There is no schema and no uniqueness
/// enforcement, and no atomic upsert, so repositories fall back to
/// check-then-act against it.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    // Key: table name
    tables: Arc<Mutex<HashMap<String, Vec<Row>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held for `table`
    pub fn row_count(&self, table: &str) -> usize {
        self.lock()
            .get(table)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Drop every row of `table`
    pub fn truncate(&self, table: &str) {
        self.lock().remove(table);
    }

    // A panic while holding the lock leaves the rows intact, so poisoning is ignored
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Row>>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn restrict(row: &Row, columns: &[String]) -> Row {
    if columns.is_empty() {
        return row.clone();
    }
    row.iter()
        .filter(|(field, _)| columns.contains(field))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

fn stored(row: Row) -> Row {
    row.into_iter()
        .map(|(field, value)| (field, value.into_scalar()))
        .collect()
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn first(
        &self,
        table: &str,
        filter: &Filter,
        columns: &[String]
    ) -> RepoResult<Option<Row>> {
        let tables = self.lock();
        let found = tables
            .get(table)
            .and_then(|rows| rows.iter().find(|row| filter.matches(row)))
            .map(|row| restrict(row, columns));
        Ok(found)
    }

    async fn select(&self, table: &str, filter: &Filter) -> RepoResult<Vec<Row>> {
        let tables = self.lock();
        let rows = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filter.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> RepoResult<u64> {
        self.lock().entry(table.to_string()).or_default().push(stored(row));
        Ok(1)
    }

    async fn update(&self, table: &str, row: Row, filter: &Filter) -> RepoResult<u64> {
        let mut tables = self.lock();
        let mut count = 0;
        if let Some(rows) = tables.get_mut(table) {
            for existing in rows.iter_mut().filter(|r| filter.matches(r)) {
                for (field, value) in row.iter() {
                    existing.insert(field.clone(), value.clone().into_scalar());
                }
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> RepoResult<u64> {
        let mut tables = self.lock();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use serde_json::json;

    #[tokio::test]
    async fn first_restricts_to_requested_columns() {
        let store = InMemoryStore::new();
        store
            .insert("user", Row::new().with("id_user", "a").with("first_name", "John")).await
            .unwrap();

        let row = store
            .first("user", &Filter::by("id_user", "a"), &["id_user".to_string()]).await
            .unwrap()
            .unwrap();
        assert_eq!(row, Row::new().with("id_user", "a"));

        let missing = store.first("user", &Filter::by("id_user", "b"), &[]).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn unknown_tables_read_as_empty() {
        let store = InMemoryStore::new();
        assert!(store.select("nope", &Filter::new()).await.unwrap().is_empty());
        assert_eq!(store.delete("nope", &Filter::new()).await.unwrap(), 0);
        assert_eq!(store.update("nope", Row::new().with("a", 1), &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_and_delete_touch_only_matching_rows() {
        let store = InMemoryStore::new();
        for (id, name) in [("a", "John"), ("b", "Mary"), ("c", "John")] {
            store.insert("user", Row::new().with("id", id).with("name", name)).await.unwrap();
        }

        let updated = store
            .update("user", Row::new().with("name", "Jack"), &Filter::by("name", "John")).await
            .unwrap();
        assert_eq!(updated, 2);

        let deleted = store.delete("user", &Filter::by("name", "Jack")).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.row_count("user"), 1);
    }

    #[tokio::test]
    async fn structured_values_are_stored_as_json_text() {
        let store = InMemoryStore::new();
        store
            .insert("profile", Row::new().with("id", 1).with("tags", Value::Json(json!(["a"])))).await
            .unwrap();

        let rows = store.select("profile", &Filter::new()).await.unwrap();
        assert_eq!(rows[0].get("tags"), Some(&Value::from("[\"a\"]")));
    }
}
