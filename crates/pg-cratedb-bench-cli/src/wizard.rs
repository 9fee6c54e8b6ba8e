//! Interactive configuration wizard for creating/editing config files.

use dialoguer::{Confirm, Input, Password, Select};
use pg_cratedb_bench::config::{
    BenchConfig, CrateDbConfig, DatasetConfig, PgLoadMethod, PostgresConfig, SyncConfig,
};
use pg_cratedb_bench::report::print_health;
use pg_cratedb_bench::{health_check_config, Config};
use std::path::Path;

/// Result type for wizard operations.
pub type WizardResult<T> = Result<T, WizardError>;

/// Errors that can occur during wizard execution.
#[derive(Debug)]
pub enum WizardError {
    /// User cancelled the wizard.
    Cancelled,
    /// IO error (file read/write).
    Io(std::io::Error),
    /// Config serialization error.
    Config(String),
    /// Validation error.
    Validation(String),
}

impl std::fmt::Display for WizardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "Configuration cancelled"),
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Config(msg) => write!(f, "Config error: {}", msg),
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for WizardError {}

impl From<std::io::Error> for WizardError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<dialoguer::Error> for WizardError {
    fn from(e: dialoguer::Error) -> Self {
        Self::Io(std::io::Error::other(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ExistingFileAction {
    Edit,
    Overwrite,
    Abort,
}

/// Run the configuration wizard.
pub async fn run_wizard(output: &Path, force: bool) -> WizardResult<()> {
    println!();
    println!("PostgreSQL vs CrateDB Benchmark - Configuration Wizard");
    println!("======================================================");
    println!();

    let existing = if output.exists() && !force {
        match prompt_existing_file_action(output)? {
            ExistingFileAction::Edit => {
                println!("Loading existing configuration...");
                match Config::load(output) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        println!("Warning: Could not parse existing file: {}", e);
                        println!("Starting with fresh configuration.\n");
                        None
                    }
                }
            }
            ExistingFileAction::Overwrite => {
                println!("Starting with fresh configuration.\n");
                None
            }
            ExistingFileAction::Abort => return Err(WizardError::Cancelled),
        }
    } else {
        None
    };

    let postgres = prompt_postgres_config(existing.as_ref().map(|c| &c.postgres))?;
    let cratedb = prompt_cratedb_config(existing.as_ref().map(|c| &c.cratedb))?;
    let dataset = prompt_dataset_config(existing.as_ref().map(|c| &c.dataset))?;
    let bench = prompt_bench_config(existing.as_ref().map(|c| &c.bench))?;

    let config = Config {
        postgres,
        cratedb,
        dataset,
        bench,
        sync: existing.map(|c| c.sync).unwrap_or_else(SyncConfig::default),
    };

    if let Err(e) = config.validate() {
        return Err(WizardError::Validation(e.to_string()));
    }

    print_summary(&config);

    if prompt_connection_test()? {
        test_connections(&config).await;
    }

    if !prompt_save_confirm(output)? {
        return Err(WizardError::Cancelled);
    }

    write_config(&config, output)?;

    println!("\nConfiguration saved to {}", output.display());
    println!("Run 'pg-cratedb-bench all' to set up, load, benchmark and sync.");

    Ok(())
}

fn prompt_existing_file_action(path: &Path) -> WizardResult<ExistingFileAction> {
    println!("File already exists: {}\n", path.display());

    let options = &["Edit existing configuration", "Overwrite with new", "Abort"];
    let selection = Select::new()
        .with_prompt("What would you like to do?")
        .items(options)
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => ExistingFileAction::Edit,
        1 => ExistingFileAction::Overwrite,
        _ => ExistingFileAction::Abort,
    })
}

fn prompt_postgres_config(existing: Option<&PostgresConfig>) -> WizardResult<PostgresConfig> {
    println!("PostgreSQL");
    println!("----------");

    let host: String = Input::new()
        .with_prompt("  Host")
        .default(
            existing
                .map(|c| c.host.clone())
                .unwrap_or_else(|| "localhost".to_string()),
        )
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("  Port")
        .default(existing.map(|c| c.port).unwrap_or(5436))
        .interact_text()?;

    let database: String = Input::new()
        .with_prompt("  Database")
        .default(
            existing
                .map(|c| c.database.clone())
                .unwrap_or_else(|| "postgres".to_string()),
        )
        .interact_text()?;

    let user: String = Input::new()
        .with_prompt("  User")
        .default(
            existing
                .map(|c| c.user.clone())
                .unwrap_or_else(|| "postgres".to_string()),
        )
        .interact_text()?;

    let password = prompt_password("  Password", existing.is_some())?;
    let password = if password.is_empty() {
        existing.map(|e| e.password.clone()).unwrap_or(password)
    } else {
        password
    };

    let ssl_modes = &["disable", "require", "verify-ca", "verify-full"];
    let current = existing.map(|c| c.ssl_mode.as_str()).unwrap_or("disable");
    let ssl_index = Select::new()
        .with_prompt("  SSL mode")
        .items(ssl_modes)
        .default(ssl_modes.iter().position(|m| *m == current).unwrap_or(0))
        .interact()?;

    println!();

    Ok(PostgresConfig {
        host,
        port,
        database,
        user,
        password,
        ssl_mode: ssl_modes[ssl_index].to_string(),
    })
}

fn prompt_cratedb_config(existing: Option<&CrateDbConfig>) -> WizardResult<CrateDbConfig> {
    println!("CrateDB");
    println!("-------");

    let url: String = Input::new()
        .with_prompt("  HTTP URL")
        .default(
            existing
                .map(|c| c.url.clone())
                .unwrap_or_else(|| "http://localhost:4203".to_string()),
        )
        .interact_text()?;

    let user: String = Input::new()
        .with_prompt("  User (blank for none)")
        .default(existing.and_then(|c| c.user.clone()).unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    let user = Some(user.trim().to_string()).filter(|u| !u.is_empty());

    let password = if user.is_some() {
        let entered = Password::new()
            .with_prompt("  Password (blank for none)")
            .allow_empty_password(true)
            .interact()?;
        if entered.is_empty() {
            existing.and_then(|c| c.password.clone())
        } else {
            Some(entered)
        }
    } else {
        None
    };

    let timeout_secs: u64 = Input::new()
        .with_prompt("  Request timeout (seconds)")
        .default(existing.map(|c| c.timeout_secs).unwrap_or(300))
        .interact_text()?;

    println!();

    Ok(CrateDbConfig {
        url,
        user,
        password,
        timeout_secs,
    })
}

fn prompt_dataset_config(existing: Option<&DatasetConfig>) -> WizardResult<DatasetConfig> {
    println!("Dataset");
    println!("-------");

    let defaults = DatasetConfig::default();
    let existing = existing.unwrap_or(&defaults);

    let record_count: usize = Input::new()
        .with_prompt("  Records per table")
        .default(existing.record_count)
        .interact_text()?;

    let seed = prompt_optional_u64("  RNG seed (blank for random)", existing.seed)?;

    let methods = &["values (multi-row INSERT)", "copy (COPY FROM STDIN)"];
    let method_index = Select::new()
        .with_prompt("  PostgreSQL load method")
        .items(methods)
        .default(match existing.pg_load_method {
            PgLoadMethod::Values => 0,
            PgLoadMethod::Copy => 1,
        })
        .interact()?;

    let refresh_after_load = Confirm::new()
        .with_prompt("  REFRESH CrateDB tables after load")
        .default(existing.refresh_after_load)
        .interact()?;

    println!();

    Ok(DatasetConfig {
        record_count,
        seed,
        pg_batch_size: existing.pg_batch_size,
        crate_bulk_chunk_size: existing.crate_bulk_chunk_size,
        pg_load_method: if method_index == 1 {
            PgLoadMethod::Copy
        } else {
            PgLoadMethod::Values
        },
        refresh_after_load,
    })
}

fn prompt_bench_config(existing: Option<&BenchConfig>) -> WizardResult<BenchConfig> {
    println!("Benchmark");
    println!("---------");

    let defaults = BenchConfig::default();
    let existing = existing.unwrap_or(&defaults);

    let bulk_insert_count: usize = Input::new()
        .with_prompt("  Bulk ingestion test rows")
        .default(existing.bulk_insert_count)
        .interact_text()?;

    let search_term: String = Input::new()
        .with_prompt("  Full-text search term")
        .default(existing.search_term.clone())
        .interact_text()?;

    let explain = Confirm::new()
        .with_prompt("  Print EXPLAIN plans")
        .default(existing.explain)
        .interact()?;

    println!();

    Ok(BenchConfig {
        bulk_insert_count,
        search_term,
        explain,
    })
}

fn prompt_password(prompt: &str, has_existing: bool) -> WizardResult<String> {
    if has_existing {
        let input: String = Password::new()
            .with_prompt(format!("{} (blank to keep existing)", prompt))
            .allow_empty_password(true)
            .interact()?;
        Ok(input)
    } else {
        let input: String = Password::new().with_prompt(prompt).interact()?;
        Ok(input)
    }
}

fn prompt_optional_u64(prompt: &str, existing: Option<u64>) -> WizardResult<Option<u64>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .default(existing.map(|v| v.to_string()).unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<u64>() {
        Ok(v) => Ok(Some(v)),
        Err(_) => {
            println!("    Invalid number, using a random seed");
            Ok(None)
        }
    }
}

fn print_summary(config: &Config) {
    println!("Configuration Summary");
    println!("---------------------");
    println!(
        "  PostgreSQL: {}@{}:{}/{} (ssl: {})",
        config.postgres.user,
        config.postgres.host,
        config.postgres.port,
        config.postgres.database,
        config.postgres.ssl_mode
    );
    println!("  CrateDB: {}", config.cratedb.url);
    println!(
        "  Dataset: {} records per table, load via {:?}",
        config.dataset.record_count, config.dataset.pg_load_method
    );
    if let Some(seed) = config.dataset.seed {
        println!("  Seed: {}", seed);
    }
    println!("  Search term: {}", config.bench.search_term);
    println!();
}

fn prompt_connection_test() -> WizardResult<bool> {
    Ok(Confirm::new()
        .with_prompt("Test database connections?")
        .default(false)
        .interact()?)
}

async fn test_connections(config: &Config) {
    use std::time::Duration;
    use tokio::time::timeout;

    println!("\nTesting connections...");

    match timeout(Duration::from_secs(30), health_check_config(config)).await {
        Ok(result) => {
            print_health(&result);
            if !result.healthy {
                println!("\n  Warning: One or more connections failed.");
            }
        }
        Err(_) => println!("  Health check timed out after 30 seconds"),
    }

    println!();
}

fn prompt_save_confirm(path: &Path) -> WizardResult<bool> {
    Ok(Confirm::new()
        .with_prompt(format!("Save to {}?", path.display()))
        .default(true)
        .interact()?)
}

fn write_config(config: &Config, path: &Path) -> WizardResult<()> {
    let header = "# PostgreSQL vs CrateDB benchmark configuration\n\
                  # Generated by pg-cratedb-bench init\n\n";

    let yaml = config
        .to_yaml()
        .map_err(|e| WizardError::Config(e.to_string()))?;

    std::fs::write(path, format!("{}{}", header, yaml))?;

    Ok(())
}
