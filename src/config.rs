use anyhow::{ Context, Result };
use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::db::repositories::Repository;
use crate::models::Row;

/// One table known to the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub primary_key: String,
    /// Declared columns; the persistable projection of dynamic rows
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Registry of repository tables, loaded from JSON:
///
/// ```json
/// { "tables": { "user": { "primary_key": "id_user", "columns": ["id_user", "first_name"] } } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub tables: BTreeMap<String, TableConfig>,
}

impl RepositoryConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to open repository config file")?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config = serde_json
            ::from_str(content)
            .context("Failed to parse repository config file")?;
        Ok(config)
    }

    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.get(name)
    }

    /// Row repository for a registered table
    pub fn dynamic_repository(&self, name: &str) -> Result<Repository<Row>> {
        let table = self
            .table(name)
            .with_context(|| format!("Table `{}` is not in the repository config", name))?;
        let repo = Repository::dynamic(name, table.primary_key.clone(), table.columns.iter().cloned())?;
        Ok(repo)
    }
}
