//! pg-cratedb-bench CLI - PostgreSQL vs CrateDB schema, load, query and sync runs.

mod wizard;

use clap::{Parser, Subcommand};
use pg_cratedb_bench::report::{print_bench, print_health, print_load, print_setup, print_sync};
use pg_cratedb_bench::{
    health_check_config, run_bench, run_load, run_setup, run_sync, BenchError, BenchOptions,
    Config, Engines, LoadOptions, SyncOptions,
};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "pg-cratedb-bench")]
#[command(about = "Compare PostgreSQL and CrateDB on the same e-commerce workload")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Timeout in seconds for graceful shutdown (default: 60)
    #[arg(long, default_value = "60")]
    shutdown_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the e-commerce schema in both databases
    Setup,

    /// Clear, generate and bulk load fake data into both databases
    Load {
        /// Override rows generated per table
        #[arg(long)]
        records: Option<usize>,

        /// RNG seed for a reproducible dataset
        #[arg(long)]
        seed: Option<u64>,

        /// Keep existing rows instead of clearing every table first
        #[arg(long)]
        skip_cleanup: bool,
    },

    /// Run the query performance comparison
    Bench {
        /// Override the full-text search term
        #[arg(long)]
        search_term: Option<String>,

        /// Skip EXPLAIN plans
        #[arg(long)]
        no_explain: bool,
    },

    /// Run the insert/update/delete synchronization demo
    Sync,

    /// Run setup, load, bench and sync in sequence
    All {
        /// Override rows generated per table
        #[arg(long)]
        records: Option<usize>,

        /// RNG seed for a reproducible dataset
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Test database connections
    HealthCheck,

    /// Create or edit a configuration file interactively
    Init {
        /// Output path for configuration file [default: config.yaml]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Force overwrite existing file without confirmation
        #[arg(long, short)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), BenchError> {
    let cli = Cli::parse();

    // Init runs before logging so prompts stay readable
    if let Commands::Init { output, force } = cli.command {
        let output_path = output.unwrap_or_else(|| PathBuf::from("config.yaml"));
        wizard::run_wizard(&output_path, force)
            .await
            .map_err(|e| BenchError::Config(e.to_string()))?;
        return Ok(());
    }

    setup_logging(&cli.verbosity, &cli.log_format, cli.output_json).map_err(BenchError::Config)?;

    let mut config = Config::load(&cli.config)?.with_auto_tuning();
    info!("Loaded configuration from {:?}", cli.config);

    if let Commands::HealthCheck = cli.command {
        let result = health_check_config(&config).await;
        if cli.output_json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_health(&result);
        }
        if !result.healthy {
            return Err(BenchError::Config("Health check failed".to_string()));
        }
        return Ok(());
    }

    let cancel = setup_signal_handler(cli.shutdown_timeout).await?;
    let shutdown = Duration::from_secs(cli.shutdown_timeout);

    match cli.command {
        Commands::Init { .. } | Commands::HealthCheck => unreachable!(), // Handled above
        Commands::Setup => {
            let engines = Engines::connect(&config).await?;
            let report = run_setup(&engines.pg, &engines.crate_db).await;
            emit(cli.output_json, &report, print_setup)?;
        }

        Commands::Load {
            records,
            seed,
            skip_cleanup,
        } => {
            apply_dataset_overrides(&mut config, records, seed)?;
            let engines = Engines::connect(&config).await?;
            let mut options = LoadOptions::from_config(&config.dataset);
            options.skip_cleanup = skip_cleanup;

            let report = until_shutdown(
                run_load(&engines.pg, &engines.crate_db, &options, &cancel),
                &cancel,
                shutdown,
            )
            .await?;
            emit(cli.output_json, &report, print_load)?;
        }

        Commands::Bench {
            search_term,
            no_explain,
        } => {
            if let Some(term) = search_term {
                config.bench.search_term = term;
            }
            if no_explain {
                config.bench.explain = false;
            }
            config.validate()?;

            let engines = Engines::connect(&config).await?;
            let options = BenchOptions::from_config(&config);
            let report = until_shutdown(
                run_bench(&engines.pg, &engines.crate_db, &options, &cancel),
                &cancel,
                shutdown,
            )
            .await?;
            emit(cli.output_json, &report, print_bench)?;
        }

        Commands::Sync => {
            let engines = Engines::connect(&config).await?;
            let options = SyncOptions::from_config(&config);
            let report = until_shutdown(
                run_sync(&engines.pg, &engines.crate_db, &options),
                &cancel,
                shutdown,
            )
            .await?;
            emit(cli.output_json, &report, print_sync)?;
            if !report.is_consistent() {
                return Err(BenchError::Sync(
                    "PostgreSQL and CrateDB diverged".to_string(),
                ));
            }
        }

        Commands::All { records, seed } => {
            apply_dataset_overrides(&mut config, records, seed)?;
            let engines = Engines::connect(&config).await?;

            let setup = run_setup(&engines.pg, &engines.crate_db).await;
            if !cli.output_json {
                print_setup(&setup);
            }

            let load_options = LoadOptions::from_config(&config.dataset);
            let load = until_shutdown(
                run_load(&engines.pg, &engines.crate_db, &load_options, &cancel),
                &cancel,
                shutdown,
            )
            .await?;
            if !cli.output_json {
                print_load(&load);
            }

            let bench_options = BenchOptions::from_config(&config);
            let bench = until_shutdown(
                run_bench(&engines.pg, &engines.crate_db, &bench_options, &cancel),
                &cancel,
                shutdown,
            )
            .await?;
            if !cli.output_json {
                print_bench(&bench);
            }

            let sync_options = SyncOptions::from_config(&config);
            let sync = until_shutdown(
                run_sync(&engines.pg, &engines.crate_db, &sync_options),
                &cancel,
                shutdown,
            )
            .await?;

            if cli.output_json {
                let all = serde_json::json!({
                    "setup": setup,
                    "load": load,
                    "bench": bench,
                    "sync": sync,
                });
                println!("{}", serde_json::to_string_pretty(&all)?);
            } else {
                print_sync(&sync);
            }

            if !sync.is_consistent() {
                return Err(BenchError::Sync(
                    "PostgreSQL and CrateDB diverged".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn apply_dataset_overrides(
    config: &mut Config,
    records: Option<usize>,
    seed: Option<u64>,
) -> Result<(), BenchError> {
    if let Some(n) = records {
        config.dataset.record_count = n;
    }
    if seed.is_some() {
        config.dataset.seed = seed;
    }
    config.validate()
}

fn emit<T: Serialize>(json: bool, report: &T, print: fn(&T)) -> Result<(), BenchError> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print(report);
    }
    Ok(())
}

/// Drive a phase to completion. Once the token fires the phase gets
/// `shutdown` to finish on its own before the run is abandoned.
async fn until_shutdown<T, F>(
    phase: F,
    cancel: &CancellationToken,
    shutdown: Duration,
) -> Result<T, BenchError>
where
    F: Future<Output = Result<T, BenchError>>,
{
    tokio::pin!(phase);
    tokio::select! {
        result = &mut phase => result,
        _ = cancel.cancelled() => {
            match tokio::time::timeout(shutdown, &mut phase).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Shutdown timeout of {}s exceeded, abandoning run", shutdown.as_secs());
                    Err(BenchError::Cancelled)
                }
            }
        }
    }
}

fn setup_logging(verbosity: &str, format: &str, output_json: bool) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries the JSON report alone.
    let writer = if output_json {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
async fn setup_signal_handler(shutdown_timeout: u64) -> Result<CancellationToken, BenchError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token_int = cancel_token.clone();
    tokio::spawn(async move {
        sigint.recv().await;
        eprintln!(
            "\nReceived SIGINT. Shutting down gracefully (timeout: {}s)...",
            shutdown_timeout
        );
        token_int.cancel();
    });

    let token_term = cancel_token.clone();
    tokio::spawn(async move {
        sigterm.recv().await;
        eprintln!(
            "\nReceived SIGTERM. Shutting down gracefully (timeout: {}s)...",
            shutdown_timeout
        );
        token_term.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler(_shutdown_timeout: u64) -> Result<CancellationToken, BenchError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Shutting down gracefully...");
                token.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    Ok(cancel_token)
}
