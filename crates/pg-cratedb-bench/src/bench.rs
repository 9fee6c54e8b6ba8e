//! Side-by-side query benchmarks.
//!
//! Five scenarios run against PostgreSQL and then CrateDB. Each measurement
//! covers statement execution plus, where requested, fetching the first
//! value. EXPLAIN runs before the timer starts.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::datagen::{customers_from, id, now_utc, Faker};
use crate::engine::Engine;
use crate::error::{BenchError, Result};
use crate::schema::{self, find_table};
use crate::value::SqlValue;

/// One statement to time on one engine.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub name: String,
    pub sql: String,
    pub params: Vec<SqlValue>,
    /// Fetch the first column of the first row and report it.
    pub fetch_result: bool,
    /// Print the plan before timing.
    pub explain: bool,
}

impl QuerySpec {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            params: Vec::new(),
            fetch_result: false,
            explain: false,
        }
    }

    pub fn params(mut self, params: Vec<SqlValue>) -> Self {
        self.params = params;
        self
    }

    pub fn fetch(mut self) -> Self {
        self.fetch_result = true;
        self
    }

    pub fn explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }
}

/// What a scenario does.
#[derive(Debug, Clone)]
pub enum ScenarioKind {
    /// Bulk insert `count` extra customers starting at `first_id`, then delete them.
    BulkIngest { first_id: usize, count: usize },
    /// Time one query per engine.
    Query { pg: QuerySpec, crate_db: QuerySpec },
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: u8,
    pub title: String,
    pub kind: ScenarioKind,
}

/// Measurement of one statement on one engine.
#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub engine: String,
    pub name: String,
    /// Seconds; `None` when the statement failed.
    pub duration_seconds: Option<f64>,
    pub result: Option<String>,
    pub plan: Vec<String>,
    pub error: Option<String>,
}

impl TestOutcome {
    fn failed(engine: &str, name: &str, plan: Vec<String>, err: &BenchError) -> Self {
        Self {
            engine: engine.to_string(),
            name: name.to_string(),
            duration_seconds: None,
            result: None,
            plan,
            error: Some(err.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub id: u8,
    pub title: String,
    pub pg: TestOutcome,
    pub crate_db: TestOutcome,
    /// Statements run after the measurement to undo its writes.
    pub cleanup: Vec<TestOutcome>,
}

impl ScenarioResult {
    /// PostgreSQL time divided by CrateDB time, when both succeeded.
    pub fn speedup(&self) -> Option<f64> {
        match (self.pg.duration_seconds, self.crate_db.duration_seconds) {
            (Some(pg), Some(cr)) if cr > 0.0 => Some(pg / cr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub record_count: usize,
    pub results: Vec<ScenarioResult>,
}

impl BenchReport {
    pub fn failures(&self) -> usize {
        self.results
            .iter()
            .flat_map(|r| [&r.pg, &r.crate_db])
            .filter(|o| !o.is_ok())
            .count()
    }
}

/// Inputs for the scenario list.
#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub record_count: usize,
    pub bulk_insert_count: usize,
    pub search_term: String,
    pub explain: bool,
    pub seed: Option<u64>,
}

impl BenchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            record_count: config.dataset.record_count,
            bulk_insert_count: config.bench.bulk_insert_count,
            search_term: config.bench.search_term.clone(),
            explain: config.bench.explain,
            seed: config.dataset.seed,
        }
    }
}

/// The five benchmark scenarios.
pub fn scenarios(options: &BenchOptions) -> Vec<Scenario> {
    let active = || vec![SqlValue::text("active")];

    vec![
        Scenario {
            id: 1,
            title: format!(
                "Massive Bulk Data Ingestion ({} Additional Customers)",
                options.bulk_insert_count
            ),
            kind: ScenarioKind::BulkIngest {
                first_id: options.record_count.saturating_add(1),
                count: options.bulk_insert_count,
            },
        },
        Scenario {
            id: 2,
            title: "Aggregate Total Sales by Category (Full Dataset)".into(),
            kind: ScenarioKind::Query {
                pg: QuerySpec::new(
                    "Total Sales by Category",
                    "SELECT p.category, SUM(oi.quantity * oi.unit_price) AS total_sales \
                     FROM order_items oi \
                     JOIN products p ON oi.product_id = p.product_id \
                     GROUP BY p.category \
                     ORDER BY total_sales DESC",
                ),
                crate_db: QuerySpec::new(
                    "Total Sales by Category",
                    "SELECT p.category, SUM(oi.quantity * oi.unit_price) AS total_sales \
                     FROM order_items AS oi \
                     INNER JOIN products AS p ON oi.product_id = p.product_id \
                     GROUP BY p.category \
                     ORDER BY total_sales DESC",
                )
                .explain(options.explain),
            },
        },
        Scenario {
            id: 3,
            title: "Daily Order Count (Last 365 Days)".into(),
            kind: ScenarioKind::Query {
                pg: QuerySpec::new(
                    "Daily Order Count",
                    "SELECT DATE_TRUNC('day', order_date) AS order_day, COUNT(order_id) AS daily_orders \
                     FROM orders \
                     WHERE order_date >= NOW() - INTERVAL '365 days' \
                     GROUP BY 1 \
                     ORDER BY 1",
                ),
                // DATE_BIN needs an explicit origin in CrateDB.
                crate_db: QuerySpec::new(
                    "Daily Order Count",
                    "SELECT DATE_BIN(INTERVAL '1 day', order_date::timestamp with time zone, 0::timestamp) AS order_day, \
                     COUNT(order_id) AS daily_orders \
                     FROM orders \
                     WHERE order_date >= NOW() - INTERVAL '365 day' \
                     GROUP BY 1 \
                     ORDER BY 1",
                ),
            },
        },
        Scenario {
            id: 4,
            title: "Full-Text Search on Product Descriptions".into(),
            kind: ScenarioKind::Query {
                pg: QuerySpec::new(
                    "Full-Text Search (ILIKE)",
                    "SELECT COUNT(*) FROM products WHERE description ILIKE $1",
                )
                .params(vec![SqlValue::Text(format!("%{}%", options.search_term))])
                .fetch(),
                crate_db: QuerySpec::new(
                    "Full-Text Search (MATCH)",
                    "SELECT COUNT(*) FROM products WHERE MATCH(description, ?)",
                )
                .params(vec![SqlValue::text(options.search_term.as_str())])
                .fetch(),
            },
        },
        Scenario {
            id: 5,
            title: "Total Spend by Customers in 'active' Status (Complex Join/Agg)".into(),
            kind: ScenarioKind::Query {
                pg: QuerySpec::new(
                    "Spend by Active Customers",
                    "SELECT c.status, SUM(o.total_amount) AS total_amount_spent \
                     FROM customers c \
                     JOIN orders o ON c.customer_id = o.customer_id \
                     WHERE c.status = $1 \
                     GROUP BY c.status",
                )
                .params(active()),
                crate_db: QuerySpec::new(
                    "Spend by Active Customers",
                    "SELECT c.status, SUM(o.total_amount) AS total_amount_spent \
                     FROM customers AS c \
                     INNER JOIN orders AS o ON c.customer_id = o.customer_id \
                     WHERE c.status = ? \
                     GROUP BY c.status",
                )
                .params(active())
                .explain(options.explain),
            },
        },
    ]
}

/// Execute and time one statement. Failures are captured in the outcome.
pub async fn run_test<E: Engine + ?Sized>(engine: &E, spec: &QuerySpec) -> TestOutcome {
    let mut plan = Vec::new();
    if spec.explain {
        match engine.explain(&spec.sql, &spec.params).await {
            Ok(lines) => {
                info!("{} - {} EXPLAIN plan:", engine.name(), spec.name);
                for line in &lines {
                    info!("    {}", line);
                }
                plan = lines;
            }
            Err(e) => {
                error!("{} - {} FAILED: {}", engine.name(), spec.name, e);
                return TestOutcome::failed(engine.name(), &spec.name, plan, &e);
            }
        }
    }

    let start = Instant::now();
    let outcome = if spec.fetch_result {
        engine
            .query(&spec.sql, &spec.params)
            .await
            .map(|r| r.first_value().map(|v| v.to_string()))
    } else {
        engine.execute(&spec.sql, &spec.params).await.map(|_| None)
    };
    let duration = start.elapsed().as_secs_f64();

    match outcome {
        Ok(result) => {
            info!(
                "{} - {}: {:.4} seconds {}",
                engine.name(),
                spec.name,
                duration,
                result
                    .as_deref()
                    .map(|r| format!("Result: {}", r))
                    .unwrap_or_default()
            );
            TestOutcome {
                engine: engine.name().to_string(),
                name: spec.name.clone(),
                duration_seconds: Some(duration),
                result,
                plan,
                error: None,
            }
        }
        Err(e) => {
            error!("{} - {} FAILED: {}", engine.name(), spec.name, e);
            TestOutcome::failed(engine.name(), &spec.name, plan, &e)
        }
    }
}

/// Time a bulk insert of prepared rows on one engine.
async fn time_bulk_insert<E: Engine + ?Sized>(
    engine: &E,
    rows: &[crate::value::ValueRow],
    cancel: &CancellationToken,
) -> Result<TestOutcome> {
    let name = "Bulk Insert Test";
    let columns = find_table(schema::CUSTOMERS)
        .map(|t| t.column_names())
        .unwrap_or_default();

    let start = Instant::now();
    match engine
        .bulk_insert(schema::CUSTOMERS, &columns, rows, cancel)
        .await
    {
        Ok(inserted) => {
            let duration = start.elapsed().as_secs_f64();
            info!("{} - {}: {:.4} seconds", engine.name(), name, duration);
            Ok(TestOutcome {
                engine: engine.name().to_string(),
                name: name.to_string(),
                duration_seconds: Some(duration),
                result: Some(inserted.to_string()),
                plan: Vec::new(),
                error: None,
            })
        }
        Err(BenchError::Cancelled) => Err(BenchError::Cancelled),
        Err(e) => {
            error!("{} - {} FAILED: {}", engine.name(), name, e);
            Ok(TestOutcome::failed(engine.name(), name, Vec::new(), &e))
        }
    }
}

/// Fresh customers for the ingestion test: registered now, all active.
pub fn ingest_rows(
    faker: &mut Faker,
    first_id: usize,
    count: usize,
) -> Result<Vec<crate::value::ValueRow>> {
    let now = now_utc();
    let mut rows = customers_from(faker, first_id, count)?;
    for row in &mut rows {
        row[3] = SqlValue::Timestamp(now);
        row[4] = SqlValue::text("active");
    }
    Ok(rows)
}

async fn run_bulk_ingest<P, C>(
    pg: &P,
    crate_db: &C,
    scenario: &Scenario,
    first_id: usize,
    count: usize,
    seed: Option<u64>,
    cancel: &CancellationToken,
) -> Result<ScenarioResult>
where
    P: Engine + ?Sized,
    C: Engine + ?Sized,
{
    let mut faker = Faker::with_seed(seed.map(|s| s.wrapping_add(1)));
    // Fails before any write when the ids leave the INTEGER range.
    let rows = ingest_rows(&mut faker, first_id, count)?;

    let pg_outcome = time_bulk_insert(pg, &rows, cancel).await?;
    let crate_outcome = time_bulk_insert(crate_db, &rows, cancel).await?;

    // Rows must be visible to CrateDB's DELETE query.
    if let Err(e) = crate_db.refresh(schema::CUSTOMERS).await {
        error!("CrateDB refresh before cleanup failed: {}", e);
    }

    let first = id(first_id)?;
    let pg_cleanup = QuerySpec::new(
        "Cleanup PG Test Data",
        "DELETE FROM customers WHERE customer_id >= $1",
    )
    .params(vec![first.clone()]);
    let crate_cleanup = QuerySpec::new(
        "Cleanup CrateDB Test Data",
        "DELETE FROM customers WHERE customer_id >= ?",
    )
    .params(vec![first]);

    let cleanup = vec![
        run_test(pg, &pg_cleanup).await,
        run_test(crate_db, &crate_cleanup).await,
    ];

    Ok(ScenarioResult {
        id: scenario.id,
        title: scenario.title.clone(),
        pg: pg_outcome,
        crate_db: crate_outcome,
        cleanup,
    })
}

/// Run all scenarios in order.
pub async fn run_bench<P, C>(
    pg: &P,
    crate_db: &C,
    options: &BenchOptions,
    cancel: &CancellationToken,
) -> Result<BenchReport>
where
    P: Engine + ?Sized,
    C: Engine + ?Sized,
{
    let started_at = Utc::now();
    let run_id = Uuid::new_v4().to_string();
    info!("Starting performance tests ({} records per table)", options.record_count);

    let mut results = Vec::new();
    for scenario in scenarios(options) {
        if cancel.is_cancelled() {
            return Err(BenchError::Cancelled);
        }
        info!("--- Test {}: {} ---", scenario.id, scenario.title);

        let result = match &scenario.kind {
            ScenarioKind::BulkIngest { first_id, count } => {
                run_bulk_ingest(
                    pg,
                    crate_db,
                    &scenario,
                    *first_id,
                    *count,
                    options.seed,
                    cancel,
                )
                .await?
            }
            ScenarioKind::Query { pg: pg_spec, crate_db: crate_spec } => ScenarioResult {
                id: scenario.id,
                title: scenario.title.clone(),
                pg: run_test(pg, pg_spec).await,
                crate_db: run_test(crate_db, crate_spec).await,
                cleanup: Vec::new(),
            },
        };
        results.push(result);
    }

    info!("All performance tests complete");
    Ok(BenchReport {
        run_id,
        started_at,
        record_count: options.record_count,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedEngine;

    fn options() -> BenchOptions {
        BenchOptions {
            record_count: 100,
            bulk_insert_count: 10,
            search_term: "lorem".into(),
            explain: true,
            seed: Some(1),
        }
    }

    fn outcome(duration: Option<f64>) -> TestOutcome {
        TestOutcome {
            engine: "x".into(),
            name: "t".into(),
            duration_seconds: duration,
            result: None,
            plan: vec![],
            error: duration.is_none().then(|| "boom".to_string()),
        }
    }

    #[test]
    fn test_scenario_list() {
        let list = scenarios(&options());
        let ids: Vec<u8> = list.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        match &list[0].kind {
            ScenarioKind::BulkIngest { first_id, count } => {
                assert_eq!(*first_id, 101);
                assert_eq!(*count, 10);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_explain_only_on_crate_tests_two_and_five() {
        for scenario in scenarios(&options()) {
            if let ScenarioKind::Query { pg, crate_db } = &scenario.kind {
                assert!(!pg.explain);
                assert_eq!(crate_db.explain, scenario.id == 2 || scenario.id == 5);
            }
        }

        let mut opts = options();
        opts.explain = false;
        for scenario in scenarios(&opts) {
            if let ScenarioKind::Query { crate_db, .. } = &scenario.kind {
                assert!(!crate_db.explain);
            }
        }
    }

    #[test]
    fn test_search_params() {
        let list = scenarios(&options());
        match &list[3].kind {
            ScenarioKind::Query { pg, crate_db } => {
                assert_eq!(pg.params, vec![SqlValue::text("%lorem%")]);
                assert_eq!(crate_db.params, vec![SqlValue::text("lorem")]);
                assert!(pg.fetch_result && crate_db.fetch_result);
                assert!(crate_db.sql.contains("MATCH(description, ?)"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_crate_time_series_uses_date_bin_origin() {
        let list = scenarios(&options());
        match &list[2].kind {
            ScenarioKind::Query { pg, crate_db } => {
                assert!(pg.sql.contains("DATE_TRUNC('day', order_date)"));
                assert!(crate_db.sql.contains("0::timestamp"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_speedup() {
        let result = ScenarioResult {
            id: 2,
            title: "t".into(),
            pg: outcome(Some(3.0)),
            crate_db: outcome(Some(1.5)),
            cleanup: vec![],
        };
        assert_eq!(result.speedup(), Some(2.0));

        let failed = ScenarioResult {
            crate_db: outcome(None),
            ..result
        };
        assert_eq!(failed.speedup(), None);
    }

    #[test]
    fn test_ingest_rows_are_active_and_fresh() {
        let mut faker = Faker::seeded(1);
        let rows = ingest_rows(&mut faker, 50, 3).unwrap();
        assert_eq!(rows[0][0], SqlValue::Int(50));
        for row in &rows {
            assert_eq!(row[4], SqlValue::text("active"));
            assert_eq!(row[3], rows[0][3]);
        }
    }

    #[tokio::test]
    async fn test_run_test_explains_then_fetches() {
        let engine = ScriptedEngine::cratedb();
        engine.push_rows(vec![vec![SqlValue::BigInt(17)]]);
        let spec = QuerySpec::new("Count", "SELECT COUNT(*) FROM products")
            .fetch()
            .explain(true);

        let outcome = run_test(&engine, &spec).await;
        assert!(outcome.is_ok());
        assert_eq!(outcome.result.as_deref(), Some("17"));
        assert_eq!(outcome.plan, vec!["Plan"]);
        assert_eq!(
            engine.statements(),
            vec![
                "EXPLAIN SELECT COUNT(*) FROM products",
                "SELECT COUNT(*) FROM products"
            ]
        );
    }

    #[tokio::test]
    async fn test_run_test_failure_has_no_duration() {
        let engine = ScriptedEngine::postgres();
        engine.fail_on("orders");
        let outcome = run_test(&engine, &QuerySpec::new("q", "SELECT * FROM orders")).await;
        assert!(outcome.duration_seconds.is_none());
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_run_bench_covers_all_scenarios() {
        let pg = ScriptedEngine::postgres();
        let cr = ScriptedEngine::cratedb();
        let cancel = CancellationToken::new();

        let report = run_bench(&pg, &cr, &options(), &cancel).await.unwrap();
        assert_eq!(report.results.len(), 5);
        assert_eq!(report.failures(), 0);
        assert_eq!(report.results[0].cleanup.len(), 2);

        let crate_sql = cr.statements();
        assert_eq!(crate_sql[0], "BULK INSERT customers");
        assert_eq!(crate_sql[1], "REFRESH customers");
        assert_eq!(crate_sql[2], "DELETE FROM customers WHERE customer_id >= ?");
        assert_eq!(
            crate_sql.iter().filter(|s| s.starts_with("EXPLAIN")).count(),
            2
        );
        assert!(!pg.statements().iter().any(|s| s.starts_with("EXPLAIN")));
    }

    #[tokio::test]
    async fn test_bulk_ingest_past_integer_range_writes_nothing() {
        let pg = ScriptedEngine::postgres();
        let cr = ScriptedEngine::cratedb();
        let cancel = CancellationToken::new();
        let mut opts = options();
        opts.record_count = i32::MAX as usize;
        opts.bulk_insert_count = 2;

        let err = run_bench(&pg, &cr, &opts, &cancel).await.unwrap_err();
        assert!(matches!(err, BenchError::Generate(_)));
        assert!(pg.statements().is_empty());
        assert!(cr.statements().is_empty());
    }
}
