//! Cleanup, dataset generation and bulk load into both engines.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::DatasetConfig;
use crate::datagen::{Dataset, Faker};
use crate::engine::Engine;
use crate::error::{BenchError, Result};
use crate::schema::CLEANUP_ORDER;

/// Knobs for one load run.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub record_count: usize,
    pub seed: Option<u64>,
    pub skip_cleanup: bool,
    pub refresh_after_load: bool,
}

impl LoadOptions {
    pub fn from_config(dataset: &DatasetConfig) -> Self {
        Self {
            record_count: dataset.record_count,
            seed: dataset.seed,
            skip_cleanup: false,
            refresh_after_load: dataset.refresh_after_load,
        }
    }
}

/// Cleanup result for one engine.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupOutcome {
    pub engine: String,
    /// Tables emptied before the first failure.
    pub cleared: Vec<String>,
    pub error: Option<String>,
    pub elapsed_seconds: f64,
}

/// Load result for one table on one engine.
#[derive(Debug, Clone, Serialize)]
pub struct TableLoad {
    pub table: String,
    pub rows: u64,
    pub elapsed_seconds: f64,
    pub error: Option<String>,
}

impl TableLoad {
    pub fn rows_per_second(&self) -> f64 {
        if self.elapsed_seconds > 0.0 {
            self.rows as f64 / self.elapsed_seconds
        } else {
            0.0
        }
    }
}

/// Load result for one engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineLoad {
    pub engine: String,
    pub tables: Vec<TableLoad>,
    pub elapsed_seconds: f64,
}

impl EngineLoad {
    pub fn rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }

    pub fn failed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.error.is_some())
            .map(|t| t.table.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub record_count: usize,
    pub cleanup: Vec<CleanupOutcome>,
    pub generate_seconds: f64,
    pub engines: Vec<EngineLoad>,
    pub total_seconds: f64,
}

impl LoadReport {
    pub fn is_success(&self) -> bool {
        self.engines.iter().all(|e| e.failed_tables().is_empty())
    }
}

/// Empty every table in cleanup order. Stops at the first failure.
pub async fn cleanup_engine<E: Engine + ?Sized>(engine: &E) -> CleanupOutcome {
    let start = Instant::now();
    let mut cleared = Vec::new();
    let mut error = None;

    for table in CLEANUP_ORDER {
        match engine.clear_table(table).await {
            Ok(()) => {
                info!("{}: cleared {}", engine.name(), table);
                cleared.push(table.to_string());
            }
            Err(e) => {
                error!("{} cleanup FAILED at {}: {}", engine.name(), table, e);
                error = Some(e.to_string());
                break;
            }
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    if error.is_none() {
        info!("{} cleanup completed in {:.2} seconds", engine.name(), elapsed);
    }

    CleanupOutcome {
        engine: engine.name().to_string(),
        cleared,
        error,
        elapsed_seconds: elapsed,
    }
}

/// Insert every table of the dataset. Table failures are recorded and the
/// next table proceeds; only cancellation aborts the engine.
pub async fn load_engine<E: Engine + ?Sized>(
    engine: &E,
    dataset: &Dataset,
    refresh: bool,
    cancel: &CancellationToken,
) -> Result<EngineLoad> {
    info!("Inserting data into {}...", engine.name());
    let start = Instant::now();
    let mut tables = Vec::with_capacity(dataset.tables.len());

    for data in &dataset.tables {
        if cancel.is_cancelled() {
            return Err(BenchError::Cancelled);
        }

        let table_start = Instant::now();
        let result = engine
            .bulk_insert(data.table, &data.columns, &data.rows, cancel)
            .await;

        let (rows, error) = match result {
            Ok(rows) => {
                if refresh {
                    if let Err(e) = engine.refresh(data.table).await {
                        warn!("{}: refresh of {} failed: {}", engine.name(), data.table, e);
                    }
                }
                info!(
                    "{}: finished inserting {} records into {}",
                    engine.name(),
                    rows,
                    data.table
                );
                (rows, None)
            }
            Err(BenchError::Cancelled) => return Err(BenchError::Cancelled),
            Err(e) => {
                error!("{}: bulk insert into {} failed: {}", engine.name(), data.table, e);
                (e.committed_rows(), Some(e.to_string()))
            }
        };

        tables.push(TableLoad {
            table: data.table.to_string(),
            rows,
            elapsed_seconds: table_start.elapsed().as_secs_f64(),
            error,
        });
    }

    let elapsed = start.elapsed();
    info!(
        "{} data insertion completed in {:.2} seconds",
        engine.name(),
        elapsed.as_secs_f64()
    );

    Ok(EngineLoad {
        engine: engine.name().to_string(),
        tables,
        elapsed_seconds: elapsed.as_secs_f64(),
    })
}

/// Generate the dataset off the async runtime.
pub async fn generate_dataset(record_count: usize, seed: Option<u64>) -> Result<(Dataset, Duration)> {
    let start = Instant::now();
    let dataset = tokio::task::spawn_blocking(move || {
        let mut faker = Faker::with_seed(seed);
        Dataset::generate(record_count, &mut faker)
    })
    .await
    .map_err(|e| BenchError::Generate(format!("generator task failed: {}", e)))??;
    Ok((dataset, start.elapsed()))
}

/// Cleanup, generate, then load PostgreSQL followed by CrateDB.
pub async fn run_load<P, C>(
    pg: &P,
    crate_db: &C,
    options: &LoadOptions,
    cancel: &CancellationToken,
) -> Result<LoadReport>
where
    P: Engine + ?Sized,
    C: Engine + ?Sized,
{
    let total_start = Instant::now();
    info!("Starting data ingestion: {} records per table", options.record_count);

    let mut cleanup = Vec::new();
    if options.skip_cleanup {
        info!("Skipping cleanup of existing data");
    } else {
        cleanup.push(cleanup_engine(pg).await);
        cleanup.push(cleanup_engine(crate_db).await);
    }

    if cancel.is_cancelled() {
        return Err(BenchError::Cancelled);
    }

    info!("Generating all data in memory...");
    let (dataset, generate_time) = generate_dataset(options.record_count, options.seed).await?;
    info!(
        "Generated {} rows in {:.2} seconds",
        dataset.total_rows(),
        generate_time.as_secs_f64()
    );

    let pg_load = load_engine(pg, &dataset, false, cancel).await?;
    let crate_load = load_engine(crate_db, &dataset, options.refresh_after_load, cancel).await?;

    let total = total_start.elapsed();
    info!(
        "Total data ingestion time (including cleanup): {:.2} seconds",
        total.as_secs_f64()
    );

    Ok(LoadReport {
        record_count: options.record_count,
        cleanup,
        generate_seconds: generate_time.as_secs_f64(),
        engines: vec![pg_load, crate_load],
        total_seconds: total.as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedEngine;

    fn options(records: usize) -> LoadOptions {
        LoadOptions {
            record_count: records,
            seed: Some(7),
            skip_cleanup: false,
            refresh_after_load: true,
        }
    }

    #[tokio::test]
    async fn test_cleanup_stops_at_first_failure() {
        let engine = ScriptedEngine::cratedb();
        engine.fail_on("CLEAR inventory");

        let outcome = cleanup_engine(&engine).await;
        assert_eq!(outcome.cleared, vec!["order_items", "orders"]);
        assert!(outcome.error.is_some());
        assert_eq!(engine.statements().len(), 3);
    }

    #[tokio::test]
    async fn test_load_runs_cleanup_then_both_engines() {
        let pg = ScriptedEngine::postgres();
        let cr = ScriptedEngine::cratedb();
        let cancel = CancellationToken::new();

        let report = run_load(&pg, &cr, &options(10), &cancel).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.cleanup.len(), 2);
        assert_eq!(report.engines[0].rows(), 50);
        assert_eq!(report.engines[1].rows(), 50);

        let pg_sql = pg.statements();
        assert_eq!(pg_sql[0], "CLEAR order_items");
        assert_eq!(pg_sql[5], "BULK INSERT customers");
        assert!(!pg_sql.iter().any(|s| s.starts_with("REFRESH")));

        let crate_sql = cr.statements();
        assert_eq!(crate_sql[5], "BULK INSERT customers");
        assert_eq!(crate_sql[6], "REFRESH customers");
    }

    #[tokio::test]
    async fn test_failed_table_does_not_stop_the_load() {
        let pg = ScriptedEngine::postgres();
        let cr = ScriptedEngine::cratedb();
        pg.fail_on("BULK INSERT orders");
        let cancel = CancellationToken::new();

        let mut opts = options(5);
        opts.skip_cleanup = true;
        let report = run_load(&pg, &cr, &opts, &cancel).await.unwrap();

        assert!(report.cleanup.is_empty());
        assert_eq!(report.engines[0].failed_tables(), vec!["orders"]);
        assert_eq!(report.engines[0].rows(), 20);
        assert_eq!(report.engines[0].tables.len(), 5);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_partial_crate_load_reports_committed_rows() {
        let pg = ScriptedEngine::postgres();
        let cr = ScriptedEngine::cratedb();
        cr.fail_bulk_after("orders", 3);
        let cancel = CancellationToken::new();

        let report = run_load(&pg, &cr, &options(5), &cancel).await.unwrap();
        let orders = &report.engines[1].tables[2];
        assert_eq!(orders.table, "orders");
        assert_eq!(orders.rows, 3);
        assert!(orders.error.is_some());
        assert_eq!(report.engines[1].rows(), 23);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_cancelled_load() {
        let pg = ScriptedEngine::postgres();
        let cr = ScriptedEngine::cratedb();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run_load(&pg, &cr, &options(5), &cancel).await.unwrap_err();
        assert!(matches!(err, BenchError::Cancelled));
    }

    #[test]
    fn test_rows_per_second() {
        let load = TableLoad {
            table: "t".into(),
            rows: 1_000,
            elapsed_seconds: 0.5,
            error: None,
        };
        assert_eq!(load.rows_per_second(), 2_000.0);
    }
}
