use anyhow::{ bail, Context, Result };
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use std::env;
use std::time::Duration;

use crate::db::common::DataStore;
use crate::db::postgres::PgStore;
use crate::db::sqlite::SqliteStore;
use crate::error::RepoResult;
use crate::models::{ Filter, Row };

/// Which database a connection string points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Backend::Postgres)
        } else if url.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else {
            bail!("Unsupported database URL scheme: {}", url)
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub connection_string: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

impl DbConfig {
    /// Create a new DbConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let db_url = env::var("DATABASE_URL").context("DATABASE_URL environment variable not set")?;

        // Default to 5 connections, but allow configuration
        let max_connections = env
            ::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("Invalid DATABASE_MAX_CONNECTIONS value")?;

        // Default timeout of 30 seconds
        let connect_timeout_secs = env
            ::var("DATABASE_CONNECT_TIMEOUT")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("Invalid DATABASE_CONNECT_TIMEOUT value")?;

        Ok(Self {
            connection_string: db_url,
            max_connections,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
        })
    }

    /// Config for an arbitrary URL with default pool settings
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            connection_string: url.into(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(30),
        }
    }

    pub fn backend(&self) -> Result<Backend> {
        Backend::from_url(&self.connection_string)
    }
}

/// Every connection to `:memory:` opens its own empty database, so a memory
/// URL gets exactly one connection that is never reaped
fn sqlite_pool_options(config: &DbConfig) -> SqlitePoolOptions {
    let options = SqlitePoolOptions::new().acquire_timeout(config.connect_timeout);
    if config.connection_string.contains(":memory:") {
        options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
    } else {
        options.max_connections(config.max_connections)
    }
}

/// SQL-backed data store, chosen from the connection URL
#[derive(Clone)]
pub enum Database {
    Postgres(PgStore),
    Sqlite(SqliteStore),
}

impl Database {
    /// Create a new database connection pool
    pub async fn connect(config: DbConfig) -> Result<Self> {
        let db = match config.backend()? {
            Backend::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(config.connect_timeout)
                    .connect(&config.connection_string).await
                    .context("Failed to connect to database")?;

                // Verify connection by running a simple query
                sqlx::query("SELECT 1").execute(&pool).await.context("Failed to execute test query")?;
                Database::Postgres(PgStore::new(pool))
            }
            Backend::Sqlite => {
                let pool = sqlite_pool_options(&config)
                    .connect(&config.connection_string).await
                    .context("Failed to connect to database")?;

                sqlx::query("SELECT 1").execute(&pool).await.context("Failed to execute test query")?;
                Database::Sqlite(SqliteStore::new(pool))
            }
        };

        log::info!("Successfully connected to {:?} database", db.backend());
        Ok(db)
    }

    pub fn backend(&self) -> Backend {
        match self {
            Self::Postgres(_) => Backend::Postgres,
            Self::Sqlite(_) => Backend::Sqlite,
        }
    }

    /// Run a schema script (statements separated by `;`)
    pub async fn execute_batch(&self, script: &str) -> RepoResult<usize> {
        match self {
            Self::Postgres(store) => store.execute_batch(script).await,
            Self::Sqlite(store) => store.execute_batch(script).await,
        }
    }

    fn store(&self) -> &dyn DataStore {
        match self {
            Self::Postgres(store) => store,
            Self::Sqlite(store) => store,
        }
    }
}

#[async_trait]
impl DataStore for Database {
    async fn first(
        &self,
        table: &str,
        filter: &Filter,
        columns: &[String]
    ) -> RepoResult<Option<Row>> {
        self.store().first(table, filter, columns).await
    }

    async fn select(&self, table: &str, filter: &Filter) -> RepoResult<Vec<Row>> {
        self.store().select(table, filter).await
    }

    async fn insert(&self, table: &str, row: Row) -> RepoResult<u64> {
        self.store().insert(table, row).await
    }

    async fn update(&self, table: &str, row: Row, filter: &Filter) -> RepoResult<u64> {
        self.store().update(table, row, filter).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> RepoResult<u64> {
        self.store().delete(table, filter).await
    }

    fn supports_atomic_upsert(&self) -> bool {
        self.store().supports_atomic_upsert()
    }

    async fn upsert(&self, table: &str, primary_key: &str, row: Row) -> RepoResult<u64> {
        self.store().upsert(table, primary_key, row).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_follows_url_scheme() {
        assert_eq!(Backend::from_url("postgres://u@localhost/db").unwrap(), Backend::Postgres);
        assert_eq!(Backend::from_url("postgresql://localhost").unwrap(), Backend::Postgres);
        assert_eq!(Backend::from_url("sqlite::memory:").unwrap(), Backend::Sqlite);
        assert!(Backend::from_url("mysql://localhost").is_err());
    }

    #[test]
    fn sqlite_memory_pool_keeps_its_only_connection() {
        let memory = format!("{:?}", sqlite_pool_options(&DbConfig::for_url("sqlite::memory:")));
        assert!(memory.contains("max_connections: 1,"), "{}", memory);
        assert!(memory.contains("min_connections: 1,"), "{}", memory);
        assert!(memory.contains("max_lifetime: None"), "{}", memory);
        assert!(memory.contains("idle_timeout: None"), "{}", memory);

        let file = format!("{:?}", sqlite_pool_options(&DbConfig::for_url("sqlite://app.db")));
        assert!(file.contains("max_connections: 5,"), "{}", file);
        assert!(!file.contains("idle_timeout: None"), "{}", file);
    }

    #[tokio::test]
    async fn sqlite_memory_database_runs_scripts() {
        let db = Database::connect(DbConfig::for_url("sqlite::memory:")).await.unwrap();
        let count = db
            .execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY); INSERT INTO t (id) VALUES ('x');").await
            .unwrap();
        assert_eq!(count, 2);

        let rows = db.select("t", &Filter::new()).await.unwrap();
        assert_eq!(rows, vec![Row::new().with("id", "x")]);
    }
}
