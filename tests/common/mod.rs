#![allow(dead_code)]

use generic_repo::{ Database, DbConfig, Entity, Persistable, RepoResult, Row };
use serde::{ Deserialize, Serialize };

pub const USER_SCHEMA: &str = include_str!("../../database/schema/user/schema.sql");

pub const PROFILE_SCHEMA: &str =
    r#"
    CREATE TABLE IF NOT EXISTS profile (
        id INTEGER PRIMARY KEY NOT NULL,
        display_name TEXT NOT NULL,
        settings TEXT,
        tags TEXT
    );
"#;

/// Fresh in-memory SQLite database with the test tables created
pub async fn sqlite_db() -> Database {
    let db = Database::connect(DbConfig::for_url("sqlite::memory:")).await.expect(
        "sqlite connects"
    );
    db.execute_batch(USER_SCHEMA).await.expect("user schema");
    db.execute_batch(PROFILE_SCHEMA).await.expect("profile schema");
    db
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id_user: String,
    pub first_name: String,
    pub last_name: String,
}

impl User {
    pub fn new(id_user: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            id_user: id_user.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }

    pub fn get_id(&self) -> &str {
        &self.id_user
    }

    pub fn get_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Persistable for User {
    fn props(&self) -> Row {
        Row::new()
            .with("id_user", self.id_user.as_str())
            .with("first_name", self.first_name.as_str())
            .with("last_name", self.last_name.as_str())
    }
}

impl Entity for User {
    const COLUMNS: &'static [&'static str] = &["id_user", "first_name", "last_name"];

    fn from_row(row: Row) -> RepoResult<Self> {
        Ok(Self {
            id_user: row.require_str("id_user")?,
            first_name: row.require_str("first_name")?,
            last_name: row.require_str("last_name")?,
        })
    }
}

/// A user carrying one more field than `User` declares
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user: User,
    pub role: String,
}

impl Persistable for AdminUser {
    fn props(&self) -> Row {
        self.user.props().with("role", self.role.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub theme: String,
    pub notifications: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub display_name: String,
    pub settings: Option<Settings>,
    pub tags: Vec<String>,
}

impl Persistable for Profile {
    fn props(&self) -> Row {
        let settings = self.settings
            .as_ref()
            .map(|s| serde_json::to_value(s).expect("settings serialize"));
        Row::new()
            .with("id", self.id)
            .with("display_name", self.display_name.as_str())
            .with("settings", settings)
            .with("tags", serde_json::json!(self.tags))
    }
}

impl Entity for Profile {
    const COLUMNS: &'static [&'static str] = &["id", "display_name", "settings", "tags"];

    fn from_row(row: Row) -> RepoResult<Self> {
        Ok(Self {
            id: row.require_i64("id")?,
            display_name: row.require_str("display_name")?,
            settings: row.get_json("settings")?,
            tags: row.get_json("tags")?.unwrap_or_default(),
        })
    }
}

/// Same checks the original suite ran on every returned user
pub fn assert_user_instance(user: &User) {
    assert!(!user.id_user.is_empty(), "id_user should be a non-empty string");
    assert!(!user.first_name.is_empty(), "first_name should be a non-empty string");
    assert!(!user.last_name.is_empty(), "last_name should be a non-empty string");
}
