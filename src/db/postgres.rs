use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{ Arc, Mutex, MutexGuard };
use sqlx::postgres::{ PgArguments, PgPool, PgRow };
use sqlx::query::Query;
use sqlx::{ Column, Postgres, Row as _, TypeInfo, ValueRef };

use crate::db::common::DataStore;
use crate::db::sql::{ self, ColumnCasts, Placeholder, Statement };
use crate::error::{ RepoError, RepoResult };
use crate::models::{ Filter, Row, Value };

const STYLE: Placeholder = Placeholder::Numbered;

const COLUMN_TYPES_SQL: &str =
    "SELECT column_name::text, udt_name::text FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1";

/// Data store backed by a Postgres connection pool.
///
/// Text values bound for json, jsonb and date/time columns are cast to the
/// column type, so rows read back from those columns can be written again.
/// Column types are looked up once per table and cached until the next
/// `execute_batch`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    // Key: table name
    casts: Arc<Mutex<HashMap<String, Arc<ColumnCasts>>>>,
}

impl PgStore {
    /// Create a new store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            casts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get a reference to the inner connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run a multi-statement script, one statement at a time
    pub async fn execute_batch(&self, script: &str) -> RepoResult<usize> {
        let statements = sql::split_statements(script);
        for stmt in &statements {
            log::debug!("Executing: {}", stmt);
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        self.cast_cache().clear();
        Ok(statements.len())
    }

    fn cast_cache(&self) -> MutexGuard<'_, HashMap<String, Arc<ColumnCasts>>> {
        self.casts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn column_casts(&self, table: &str) -> RepoResult<Arc<ColumnCasts>> {
        let cached = self.cast_cache().get(table).cloned();
        if let Some(casts) = cached {
            return Ok(casts);
        }

        let columns: Vec<(String, String)> = sqlx
            ::query_as(COLUMN_TYPES_SQL)
            .bind(table)
            .fetch_all(&self.pool).await?;
        let casts = Arc::new(casts_from_columns(columns));
        self.cast_cache().insert(table.to_string(), Arc::clone(&casts));
        Ok(casts)
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

/// Keep the columns whose text parameters need a cast
fn casts_from_columns(columns: impl IntoIterator<Item = (String, String)>) -> ColumnCasts {
    columns
        .into_iter()
        .filter_map(|(column, udt_name)| cast_for(&udt_name).map(|cast| (column, cast.to_string())))
        .collect()
}

/// Column types read back as text or JSON that have no assignment cast from `text`
fn cast_for(udt_name: &str) -> Option<&'static str> {
    match udt_name {
        "json" => Some("json"),
        "jsonb" => Some("jsonb"),
        "timestamptz" => Some("timestamptz"),
        "timestamp" => Some("timestamp"),
        "date" => Some("date"),
        _ => None,
    }
}

fn build(stmt: &Statement) -> Query<'_, Postgres, PgArguments> {
    stmt.params
        .iter()
        .fold(sqlx::query(&stmt.sql), |query, value| bind_value(query, value))
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Integer(i) => query.bind(*i),
        Value::Real(r) => query.bind(*r),
        Value::Text(s) => query.bind(s.clone()),
        Value::Json(json) => query.bind(json.to_string()),
    }
}

/// Map a Postgres row onto a `Row`, column by column
fn decode_row(row: &PgRow) -> RepoResult<Row> {
    let mut out = Row::new();

    for column in row.columns() {
        let idx = column.ordinal();
        let name = column.name();

        if row.try_get_raw(idx)?.is_null() {
            out.insert(name, Value::Null);
            continue;
        }

        let value = match column.type_info().name() {
            "BOOL" => Value::Bool(row.try_get(idx)?),
            "INT2" => Value::Integer(row.try_get::<i16, _>(idx)? as i64),
            "INT4" => Value::Integer(row.try_get::<i32, _>(idx)? as i64),
            "INT8" => Value::Integer(row.try_get(idx)?),
            "FLOAT4" => Value::Real(row.try_get::<f32, _>(idx)? as f64),
            "FLOAT8" => Value::Real(row.try_get(idx)?),
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => Value::Text(row.try_get(idx)?),
            "JSON" | "JSONB" => Value::from(row.try_get::<serde_json::Value, _>(idx)?),
            "TIMESTAMPTZ" => {
                let ts: chrono::DateTime<chrono::Utc> = row.try_get(idx)?;
                Value::Text(ts.to_rfc3339())
            }
            "TIMESTAMP" => {
                let ts: chrono::NaiveDateTime = row.try_get(idx)?;
                Value::Text(ts.to_string())
            }
            "DATE" => {
                let date: chrono::NaiveDate = row.try_get(idx)?;
                Value::Text(date.to_string())
            }
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
impl DataStore for PgStore {
    async fn first(
        &self,
        table: &str,
        filter: &Filter,
        columns: &[String]
    ) -> RepoResult<Option<Row>> {
        let casts = self.column_casts(table).await?;
        self.fetch_optional(sql::select(table, columns, filter, Some(1), STYLE, Some(&*casts))).await
    }

    async fn select(&self, table: &str, filter: &Filter) -> RepoResult<Vec<Row>> {
        let casts = self.column_casts(table).await?;
        self.fetch_all(sql::select(table, &[], filter, None, STYLE, Some(&*casts))).await
    }

    async fn insert(&self, table: &str, row: Row) -> RepoResult<u64> {
        let casts = self.column_casts(table).await?;
        self.execute(sql::insert(table, &row, STYLE, Some(&*casts))).await
    }

    async fn update(&self, table: &str, row: Row, filter: &Filter) -> RepoResult<u64> {
        let casts = self.column_casts(table).await?;
        self.execute(sql::update(table, &row, filter, STYLE, Some(&*casts))).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> RepoResult<u64> {
        let casts = self.column_casts(table).await?;
        self.execute(sql::delete(table, filter, STYLE, Some(&*casts))).await
    }

    fn supports_atomic_upsert(&self) -> bool {
        true
    }

    async fn upsert(&self, table: &str, primary_key: &str, row: Row) -> RepoResult<u64> {
        let casts = self.column_casts(table).await?;
        self.execute(sql::upsert(table, primary_key, &row, STYLE, Some(&*casts))).await
    }
}
