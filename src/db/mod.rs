pub mod common;
pub mod memory_store;
pub mod pool;
pub mod postgres;
pub mod repositories;
pub mod sql;
pub mod sqlite;

pub use common::*;
pub use memory_store::*;
pub use pool::*;
pub use postgres::PgStore;
pub use repositories::*;
pub use sqlite::SqliteStore;
