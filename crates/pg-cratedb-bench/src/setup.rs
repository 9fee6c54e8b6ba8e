//! Schema creation on both engines.

use std::time::Instant;

use serde::Serialize;
use tracing::{error, info};

use crate::engine::Engine;
use crate::schema::{catalog, Dialect};

/// Result of creating one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableOutcome {
    pub table: String,
    pub error: Option<String>,
}

impl TableOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Setup result for one engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSetup {
    pub engine: String,
    pub tables: Vec<TableOutcome>,
    pub elapsed_seconds: f64,
}

impl EngineSetup {
    pub fn failed(&self) -> usize {
        self.tables.iter().filter(|t| !t.is_ok()).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupReport {
    pub engines: Vec<EngineSetup>,
}

impl SetupReport {
    pub fn is_success(&self) -> bool {
        self.engines.iter().all(|e| e.failed() == 0)
    }
}

/// Create every catalog table on one engine. A failing table is recorded and
/// the remaining tables are still attempted.
pub async fn setup_engine<E: Engine + ?Sized>(engine: &E) -> EngineSetup {
    info!("Creating tables in {}...", engine.name());
    let dialect = engine.dialect();
    let start = Instant::now();

    let mut tables = Vec::new();
    for table in catalog() {
        let ddl = dialect.create_table_sql(&table);
        let error = match engine.execute(&ddl, &[]).await {
            Ok(_) => {
                info!("{}: created table {}", engine.name(), table.name);
                None
            }
            Err(e) => {
                error!("{}: error creating table {}: {}", engine.name(), table.name, e);
                Some(e.to_string())
            }
        };
        tables.push(TableOutcome {
            table: table.name.to_string(),
            error,
        });
    }

    let elapsed = start.elapsed();
    info!(
        "{} tables created in {:.2} seconds",
        engine.name(),
        elapsed.as_secs_f64()
    );

    EngineSetup {
        engine: engine.name().to_string(),
        tables,
        elapsed_seconds: elapsed.as_secs_f64(),
    }
}

/// Create the schema on PostgreSQL, then on CrateDB.
pub async fn run_setup<P, C>(pg: &P, crate_db: &C) -> SetupReport
where
    P: Engine + ?Sized,
    C: Engine + ?Sized,
{
    let engines = vec![setup_engine(pg).await, setup_engine(crate_db).await];
    SetupReport { engines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedEngine;

    #[tokio::test]
    async fn test_setup_creates_every_table_on_both_engines() {
        let pg = ScriptedEngine::postgres();
        let cr = ScriptedEngine::cratedb();

        let report = run_setup(&pg, &cr).await;
        assert!(report.is_success());
        assert_eq!(report.engines.len(), 2);
        assert_eq!(report.engines[0].engine, "PostgreSQL");
        assert_eq!(report.engines[1].engine, "CrateDB");

        let pg_sql = pg.statements();
        assert_eq!(pg_sql.len(), 5);
        assert!(pg_sql.iter().all(|s| s.starts_with("CREATE TABLE IF NOT EXISTS")));
        assert!(cr.statements()[1].contains("FULLTEXT"));
    }

    #[tokio::test]
    async fn test_setup_continues_after_failure() {
        let pg = ScriptedEngine::postgres();
        let cr = ScriptedEngine::cratedb();
        cr.fail_on("\"products\"");

        let report = run_setup(&pg, &cr).await;
        assert!(!report.is_success());
        assert_eq!(report.engines[0].failed(), 0);

        let crate_setup = &report.engines[1];
        assert_eq!(crate_setup.failed(), 1);
        assert_eq!(crate_setup.tables.len(), 5);
        assert!(!crate_setup.tables[1].is_ok());
        assert!(crate_setup.tables[2].is_ok());
    }
}
