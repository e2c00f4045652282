use std::fmt;
use std::sync::Arc;

use crate::config::TableConfig;
use crate::db::common::{ DataStore, WriteOutcome };
use crate::db::repositories::projection::project;
use crate::error::{ RepoError, RepoResult };
use crate::models::{ Entity, Filter, Persistable, Row };

/// Closure turning a raw row into a domain value
pub type Factory<T> = Arc<dyn (Fn(Row) -> RepoResult<T>) + Send + Sync>;

/// How rows read back from the store become domain values
pub enum Reconstruct<T> {
    /// The entity's own `from_row`
    Entity(fn(Row) -> RepoResult<T>),
    Factory(Factory<T>),
}

impl<T> Reconstruct<T> {
    fn build(&self, row: Row) -> RepoResult<T> {
        match self {
            Reconstruct::Entity(from_row) => from_row(row),
            Reconstruct::Factory(factory) => factory(row),
        }
    }
}

impl<T> Clone for Reconstruct<T> {
    fn clone(&self) -> Self {
        match self {
            Reconstruct::Entity(from_row) => Reconstruct::Entity(*from_row),
            Reconstruct::Factory(factory) => Reconstruct::Factory(Arc::clone(factory)),
        }
    }
}

/// Maps domain values onto the rows of one table.
///
/// The configuration is fixed at construction; the repository keeps no
/// other state, so one instance can serve any number of concurrent callers.
/// Every operation takes the store to run against as its first argument.
pub struct Repository<T> {
    table: String,
    primary_key: String,
    columns: Vec<String>,
    reconstruct: Reconstruct<T>,
}

impl<T: Entity> Repository<T> {
    /// Repository for an entity type, projecting onto `T::COLUMNS`
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> RepoResult<Self> {
        Self::build(
            table.into(),
            primary_key.into(),
            T::COLUMNS.iter().map(|c| c.to_string()).collect(),
            Reconstruct::Entity(T::from_row)
        )
    }

    /// Repository for an entity type, taking table and key from a registry entry
    pub fn from_config(table: &str, config: &TableConfig) -> RepoResult<Self> {
        Self::new(table, config.primary_key.clone())
    }
}

impl Repository<Row> {
    /// Repository over plain rows, projecting onto a runtime column list
    pub fn dynamic(
        table: impl Into<String>,
        primary_key: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>
    ) -> RepoResult<Self> {
        Self::with_factory(table, primary_key, columns, Ok)
    }
}

impl<T> Repository<T> {
    /// Repository with an explicit column list and reconstruction closure
    pub fn with_factory<F>(
        table: impl Into<String>,
        primary_key: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
        factory: F
    ) -> RepoResult<Self>
        where F: Fn(Row) -> RepoResult<T> + Send + Sync + 'static
    {
        Self::build(
            table.into(),
            primary_key.into(),
            columns.into_iter().map(Into::into).collect(),
            Reconstruct::Factory(Arc::new(factory))
        )
    }

    fn build(
        table: String,
        primary_key: String,
        columns: Vec<String>,
        reconstruct: Reconstruct<T>
    ) -> RepoResult<Self> {
        if table.trim().is_empty() {
            return Err(RepoError::InvalidConfig("table name is empty".to_string()));
        }
        if !columns.contains(&primary_key) {
            return Err(
                RepoError::InvalidConfig(
                    format!("primary key `{}` is not a declared column of `{}`", primary_key, table)
                )
            );
        }
        Ok(Self {
            table,
            primary_key,
            columns,
            reconstruct,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The fields of `instance` this repository writes
    pub fn persistable_row<P>(&self, instance: &P, ignore_primary_key: bool) -> Row
        where P: Persistable + ?Sized
    {
        project(&instance.props(), &self.columns, &self.primary_key, ignore_primary_key)
    }

    /// Insert `instance`, or update the row that already has its primary key
    pub async fn upsert<S, P>(&self, store: &S, instance: &P) -> RepoResult<WriteOutcome>
        where S: DataStore + ?Sized, P: Persistable + ?Sized
    {
        let props = instance.props();
        let key = match props.get(&self.primary_key) {
            Some(value) if !value.is_null() => value.clone().into_scalar(),
            _ => {
                return Err(RepoError::MissingPrimaryKey(self.primary_key.clone()));
            }
        };

        // The insert half of an atomic upsert is checked against NOT NULL
        // before the conflict resolves, so a partial projection has to go
        // through a plain update
        let full = project(&props, &self.columns, &self.primary_key, false);
        if store.supports_atomic_upsert() && full.len() == self.columns.len() {
            let rows_affected = store.upsert(&self.table, &self.primary_key, full).await?;
            log::debug!("[repository] {} - upserted {}={}", self.table, self.primary_key, key);
            return Ok(WriteOutcome::Upserted { rows_affected });
        }

        let by_key = Filter::by(self.primary_key.clone(), key.clone());
        let outcome = if self.exists(store, &by_key).await? {
            let row = project(&props, &self.columns, &self.primary_key, true);
            // Nothing but the key is declared, so there is nothing to SET
            let rows_affected = if row.is_empty() {
                0
            } else {
                store.update(&self.table, row, &by_key).await?
            };
            WriteOutcome::Updated { rows_affected }
        } else {
            let mut row = full;
            row.insert(self.primary_key.clone(), key.clone());
            WriteOutcome::Inserted {
                rows_affected: store.insert(&self.table, row).await?,
            }
        };

        log::debug!("[repository] {} - {:?} for {}={}", self.table, outcome, self.primary_key, key);
        Ok(outcome)
    }

    /// First value matching `filter`, or `None`
    pub async fn get<S>(&self, store: &S, filter: &Filter) -> RepoResult<Option<T>>
        where S: DataStore + ?Sized
    {
        let row = store.first(&self.table, filter, &[]).await?;
        log::debug!("[repository] {} - get {}: found={}", self.table, filter, row.is_some());
        row.map(|row| self.reconstruct.build(row)).transpose()
    }

    /// Every value matching `filter`, or the whole table without one
    pub async fn get_all<S>(&self, store: &S, filter: Option<&Filter>) -> RepoResult<Vec<T>>
        where S: DataStore + ?Sized
    {
        let everything = Filter::new();
        let filter = filter.unwrap_or(&everything);
        let rows = store.select(&self.table, filter).await?;
        log::debug!("[repository] {} - get_all {}: {} rows", self.table, filter, rows.len());
        rows.into_iter()
            .map(|row| self.reconstruct.build(row))
            .collect()
    }

    /// Whether any row matches `filter`; reads only the primary key column
    pub async fn exists<S>(&self, store: &S, filter: &Filter) -> RepoResult<bool>
        where S: DataStore + ?Sized
    {
        let probe = store
            .first(&self.table, filter, std::slice::from_ref(&self.primary_key)).await?;
        Ok(probe.is_some())
    }

    /// Delete every row matching `filter`, returning how many went
    pub async fn del<S>(&self, store: &S, filter: &Filter) -> RepoResult<u64>
        where S: DataStore + ?Sized
    {
        let deleted = store.delete(&self.table, filter).await?;
        log::debug!("[repository] {} - deleted {} rows matching {}", self.table, deleted, filter);
        Ok(deleted)
    }
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            primary_key: self.primary_key.clone(),
            columns: self.columns.clone(),
            reconstruct: self.reconstruct.clone(),
        }
    }
}

impl<T> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}
