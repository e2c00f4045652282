// Re-export core modules
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod utils;

// Re-export common types and traits
pub use config::{ RepositoryConfig, TableConfig };
pub use error::{ RepoError, RepoResult };
pub use models::{ Entity, Filter, Persistable, Row, Value };

pub use db::{ Database, DbConfig, Backend };
pub use db::{ DataStore, WriteOutcome, InMemoryStore, PgStore, SqliteStore };
pub use db::repositories::{ Reconstruct, Repository };
