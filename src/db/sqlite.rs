use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{ SqliteArguments, SqlitePool, SqliteRow };
use sqlx::{ Column, Row as _, Sqlite, TypeInfo, ValueRef };

use crate::db::common::DataStore;
use crate::db::sql::{ self, Placeholder, Statement };
use crate::error::{ RepoError, RepoResult };
use crate::models::{ Filter, Row, Value };

const STYLE: Placeholder = Placeholder::Question;

/// Data store backed by a SQLite connection pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run a multi-statement script, one statement at a time
    pub async fn execute_batch(&self, script: &str) -> RepoResult<usize> {
        let statements = sql::split_statements(script);
        for stmt in &statements {
            log::debug!("Executing: {}", stmt);
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(statements.len())
    }

    async fn fetch_optional(&self, stmt: Statement) -> RepoResult<Option<Row>> {
        let row = build(&stmt).fetch_optional(&self.pool).await?;
        row.map(|row| decode_row(&row)).transpose()
    }

    async fn fetch_all(&self, stmt: Statement) -> RepoResult<Vec<Row>> {
        let rows = build(&stmt).fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, stmt: Statement) -> RepoResult<u64> {
        let result = build(&stmt).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn build(stmt: &Statement) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    stmt.params
        .iter()
        .fold(sqlx::query(&stmt.sql), |query, value| bind_value(query, value))
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Integer(i) => query.bind(*i),
        Value::Real(r) => query.bind(*r),
        Value::Text(s) => query.bind(s.clone()),
        Value::Json(json) => query.bind(json.to_string()),
    }
}

/// SQLite columns are typed per value, so decoding follows the storage class
/// of each cell rather than the declared column type
fn decode_row(row: &SqliteRow) -> RepoResult<Row> {
    let mut out = Row::new();

    for column in row.columns() {
        let idx = column.ordinal();
        let name = column.name();

        let storage_class = {
            let raw = row.try_get_raw(idx)?;
            if raw.is_null() {
                out.insert(name, Value::Null);
                continue;
            }
            raw.type_info().name().to_string()
        };

        let value = match storage_class.as_str() {
            "INTEGER" | "BOOLEAN" => Value::Integer(row.try_get_unchecked(idx)?),
            "REAL" => Value::Real(row.try_get_unchecked(idx)?),
            "TEXT" | "DATE" | "TIME" | "DATETIME" => Value::Text(row.try_get_unchecked(idx)?),
            other => {
                return Err(RepoError::UnsupportedColumnType {
                    column: name.to_string(),
                    type_name: other.to_string(),
                });
            }
        };
        out.insert(name, value);
    }

    Ok(out)
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn first(
        &self,
        table: &str,
        filter: &Filter,
        columns: &[String]
    ) -> RepoResult<Option<Row>> {
        self.fetch_optional(sql::select(table, columns, filter, Some(1), STYLE, None)).await
    }

    async fn select(&self, table: &str, filter: &Filter) -> RepoResult<Vec<Row>> {
        self.fetch_all(sql::select(table, &[], filter, None, STYLE, None)).await
    }

    async fn insert(&self, table: &str, row: Row) -> RepoResult<u64> {
        self.execute(sql::insert(table, &row, STYLE, None)).await
    }

    async fn update(&self, table: &str, row: Row, filter: &Filter) -> RepoResult<u64> {
        self.execute(sql::update(table, &row, filter, STYLE, None)).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> RepoResult<u64> {
        self.execute(sql::delete(table, filter, STYLE, None)).await
    }

    fn supports_atomic_upsert(&self) -> bool {
        true
    }

    async fn upsert(&self, table: &str, primary_key: &str, row: Row) -> RepoResult<u64> {
        self.execute(sql::upsert(table, primary_key, &row, STYLE, None)).await
    }
}
