use async_trait::async_trait;

use crate::error::{ RepoError, RepoResult };
use crate::models::{ Filter, Row };

/// What a repository write did to the backing table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted {
        rows_affected: u64,
    },
    Updated {
        rows_affected: u64,
    },
    /// Single insert-on-conflict-update statement; the store does not say which branch ran
    Upserted {
        rows_affected: u64,
    },
}

impl WriteOutcome {
    pub fn rows_affected(&self) -> u64 {
        match self {
            WriteOutcome::Inserted { rows_affected }
            | WriteOutcome::Updated { rows_affected }
            | WriteOutcome::Upserted { rows_affected } => *rows_affected,
        }
    }
}

/// Table-scoped CRUD primitives that every backing store provides
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataStore: Send + Sync {
    /// First row matching `filter`, restricted to `columns` (all columns when empty)
    async fn first(
        &self,
        table: &str,
        filter: &Filter,
        columns: &[String]
    ) -> RepoResult<Option<Row>>;

    /// Every row matching `filter`, in store-defined order
    async fn select(&self, table: &str, filter: &Filter) -> RepoResult<Vec<Row>>;

    async fn insert(&self, table: &str, row: Row) -> RepoResult<u64>;

    async fn update(&self, table: &str, row: Row, filter: &Filter) -> RepoResult<u64>;

    async fn delete(&self, table: &str, filter: &Filter) -> RepoResult<u64>;

    /// Whether `upsert` is available as a single atomic statement
    fn supports_atomic_upsert(&self) -> bool {
        false
    }

    /// Insert `row`, or update every non-key column when a row with the same
    /// `primary_key` value already exists
    async fn upsert(&self, _table: &str, _primary_key: &str, _row: Row) -> RepoResult<u64> {
        Err(RepoError::Unsupported("atomic upsert"))
    }
}
