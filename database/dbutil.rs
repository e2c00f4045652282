use anyhow::{ bail, Context, Result };
use clap::{ Parser, ValueEnum };
use std::fs;
use std::path::Path;

use generic_repo::db::{ Database, DbConfig };
use generic_repo::utils::logging::{ log_activity, log_error };

const SCHEMA_ROOT: &str = "database/schema";

// Define valid operations
#[derive(Debug, Clone, ValueEnum)]
enum Operation {
    Create,
    Delete,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Database utility for schema management")]
struct Args {
    /// Operation to perform (create or delete)
    #[arg(value_enum)]
    operation: Operation,

    /// Schemas to target, by directory name under database/schema (all when omitted)
    schemas: Vec<String>,

    /// Database URL (overrides .env)
    #[arg(long)]
    database_url: Option<String>,

    /// Skip confirmation prompts
    #[arg(long)]
    yes: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();
    env_logger::init();

    // Parse command line arguments
    let args = Args::parse();

    let db_config = match &args.database_url {
        Some(url) => DbConfig::for_url(url.clone()),
        None => DbConfig::from_env().context("Failed to get database configuration")?,
    };

    if args.verbose {
        println!("Database URL: {}", db_config.connection_string);
        println!("Operation: {:?}", args.operation);
    }

    let mut schemas = if args.schemas.is_empty() {
        discover_schemas(Path::new(SCHEMA_ROOT))?
    } else {
        args.schemas.clone()
    };
    if schemas.is_empty() {
        bail!("No schemas found under {}", SCHEMA_ROOT);
    }

    // Drop in reverse order so later schemas can depend on earlier ones
    if matches!(args.operation, Operation::Delete) {
        schemas.reverse();
    }

    let db = Database::connect(db_config).await.context("Failed to connect to database")?;
    println!("Connected to database.");

    for schema in &schemas {
        let dir = Path::new(SCHEMA_ROOT).join(schema);

        match args.operation {
            Operation::Create => {
                println!("Creating schema for {}...", schema);
                run_script(&db, &dir.join("schema.sql"), args.verbose).await?;
                println!("Successfully created schema for {}", schema);
            }
            Operation::Delete => {
                if !args.yes && !confirm(schema)? {
                    println!("Skipping deletion of {} schema.", schema);
                    continue;
                }
                println!("Deleting schema for {}...", schema);
                run_script(&db, &dir.join("delete.sql"), args.verbose).await?;
                println!("Successfully deleted schema for {}", schema);
            }
        }
    }

    println!("Database operation completed successfully.");
    Ok(())
}

/// Every subdirectory of the schema root, sorted by name
fn discover_schemas(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("Failed to read {}", root.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn confirm(schema: &str) -> Result<bool> {
    println!("WARNING: You are about to delete the {} schema!", schema);
    println!("This will delete all data in its tables.");
    println!("Please type 'yes' to continue or any other input to skip:");

    let mut input = String::new();
    std::io::stdin().read_line(&mut input).context("Failed to read input")?;
    Ok(input.trim().eq_ignore_ascii_case("yes"))
}

async fn run_script(db: &Database, path: &Path, verbose: bool) -> Result<()> {
    if !path.exists() {
        println!("Warning: Schema file not found at {}", path.display());
        return Ok(());
    }

    let sql = fs
        ::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {}", path.display()))?;

    match db.execute_batch(&sql).await {
        Ok(count) => {
            if verbose {
                log_activity("dbutil", "Executed script", Some(&format!("{} statements from {}", count, path.display())));
            }
            Ok(())
        }
        Err(err) => {
            log_error("dbutil", &format!("Failed to execute {}", path.display()), &err);
            Err(err.into())
        }
    }
}
