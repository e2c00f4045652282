/******************************************************************************
 * REPOSITORY CLI ENTRY POINT
 *
 * Runs repository operations (list, get, exists, delete, upsert) against a
 * table registered in the repository config file.
 ******************************************************************************/

use anyhow::{ anyhow, Context, Result };
use clap::{ Parser, Subcommand };

use generic_repo::{
    db::{ Database, DbConfig },
    utils::logging::{ log_activity, log_stats },
    Filter,
    RepositoryConfig,
    Row,
    Value,
};

// Default values
const DEFAULT_CONFIG_FILE: &str = "database/config/repositories.json";

/// Generic repository CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the repository config file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Database URL (overrides .env)
    #[arg(long)]
    database_url: Option<String>,

    /// Table to operate on
    #[arg(long)]
    table: String,

    /// Repository command to run
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List rows, optionally filtered
    List {
        /// Equality filters as key=value
        #[arg(long = "filter")]
        filters: Vec<String>,
    },
    /// Print the first row matching the filter
    Get {
        #[arg(long = "filter", required = true)]
        filters: Vec<String>,
    },
    /// Check whether any row matches the filter
    Exists {
        #[arg(long = "filter", required = true)]
        filters: Vec<String>,
    },
    /// Delete every row matching the filter
    Delete {
        #[arg(long = "filter", required = true)]
        filters: Vec<String>,
    },
    /// Insert or update a row given as a JSON object
    Upsert {
        #[arg(long)]
        json: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();
    env_logger::init();

    // Parse command line arguments
    let cli = Cli::parse();

    let registry = RepositoryConfig::load_from_file(&cli.config_file).with_context(||
        format!("Failed to load {}", cli.config_file)
    )?;
    let repository = registry.dynamic_repository(&cli.table)?;

    // Get database configuration
    let db_config = match &cli.database_url {
        Some(url) => DbConfig::for_url(url.clone()),
        None => DbConfig::from_env().context("Failed to get database configuration")?,
    };

    // Connect to the database
    let db = Database::connect(db_config).await.context("Failed to connect to database")?;

    match &cli.command {
        Command::List { filters } => {
            let filter = parse_filters(filters)?;
            let rows = repository.get_all(&db, Some(&filter)).await?;
            log_stats("repo", "Listed rows", &format!("{} from {}", rows.len(), cli.table));
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::Get { filters } => {
            let filter = parse_filters(filters)?;
            match repository.get(&db, &filter).await? {
                Some(row) => println!("{}", serde_json::to_string_pretty(&row)?),
                None => println!("null"),
            }
        }
        Command::Exists { filters } => {
            let filter = parse_filters(filters)?;
            println!("{}", repository.exists(&db, &filter).await?);
        }
        Command::Delete { filters } => {
            let filter = parse_filters(filters)?;
            let deleted = repository.del(&db, &filter).await?;
            log_activity("repo", "Deleted rows", Some(&format!("{} matching {}", deleted, filter)));
            println!("{}", deleted);
        }
        Command::Upsert { json } => {
            let row: Row = serde_json::from_str(json).context("Upsert payload must be a flat JSON object")?;
            let outcome = repository.upsert(&db, &row).await?;
            log_activity("repo", "Upserted row", Some(&format!("{:?}", outcome)));
            println!("{}", outcome.rows_affected());
        }
    }

    Ok(())
}

/// Parse `key=value` pairs; values that read as JSON keep their type, anything else is text
fn parse_filters(filters: &[String]) -> Result<Filter> {
    let mut filter = Filter::new();
    for pair in filters {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid filter `{}`, expected key=value", pair))?;
        let value = serde_json
            ::from_str::<serde_json::Value>(raw)
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(raw));
        filter = filter.with(key.trim(), value);
    }
    Ok(filter)
}
