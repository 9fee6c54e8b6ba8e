//! Console rendering of phase reports.

use std::fmt::Write;
use std::time::Duration;

use crate::bench::{BenchReport, TestOutcome};
use crate::health::HealthCheckResult;
use crate::load::LoadReport;
use crate::setup::SetupReport;
use crate::sync::SyncReport;

/// Human-readable duration: seconds above one second, then ms, then µs.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else if d.as_millis() >= 1 {
        format!("{:.1}ms", secs * 1_000.0)
    } else {
        format!("{}µs", d.as_micros())
    }
}

/// Throughput with K/M suffixes.
pub fn format_rate(rows: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return "-".to_string();
    }
    let rate = rows as f64 / secs;
    if rate >= 1_000_000.0 {
        format!("{:.2}M rows/s", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.1}K rows/s", rate / 1_000.0)
    } else {
        format!("{:.0} rows/s", rate)
    }
}

/// Format a large number with commas.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

fn secs(seconds: f64) -> String {
    format_duration(Duration::from_secs_f64(seconds.max(0.0)))
}

fn outcome_line(outcome: &TestOutcome) -> String {
    match (&outcome.error, outcome.duration_seconds) {
        (Some(err), _) => format!("{} - {} FAILED: {}", outcome.engine, outcome.name, err),
        (None, Some(d)) => {
            let result = outcome
                .result
                .as_deref()
                .map(|r| format!(" Result: {}", r))
                .unwrap_or_default();
            format!("{} - {}: {:.4} seconds{}", outcome.engine, outcome.name, d, result)
        }
        (None, None) => format!("{} - {}: no timing", outcome.engine, outcome.name),
    }
}

pub fn render_setup(report: &SetupReport) -> String {
    let mut out = String::from("Schema setup:\n");
    for engine in &report.engines {
        let _ = writeln!(
            out,
            "  {}: {}/{} tables in {}",
            engine.engine,
            engine.tables.len() - engine.failed(),
            engine.tables.len(),
            secs(engine.elapsed_seconds)
        );
        for table in engine.tables.iter().filter(|t| !t.is_ok()) {
            let _ = writeln!(
                out,
                "    {} FAILED: {}",
                table.table,
                table.error.as_deref().unwrap_or_default()
            );
        }
    }
    out
}

pub fn render_load(report: &LoadReport) -> String {
    let mut out = format!(
        "Data ingestion ({} records per table):\n",
        format_number(report.record_count as u64)
    );

    for cleanup in &report.cleanup {
        match &cleanup.error {
            None => {
                let _ = writeln!(
                    out,
                    "  {} cleanup: {}",
                    cleanup.engine,
                    secs(cleanup.elapsed_seconds)
                );
            }
            Some(e) => {
                let _ = writeln!(out, "  {} cleanup FAILED: {}", cleanup.engine, e);
            }
        }
    }
    let _ = writeln!(out, "  Generation: {}", secs(report.generate_seconds));

    for engine in &report.engines {
        let _ = writeln!(
            out,
            "  {}: {} rows in {} ({})",
            engine.engine,
            format_number(engine.rows()),
            secs(engine.elapsed_seconds),
            format_rate(engine.rows(), Duration::from_secs_f64(engine.elapsed_seconds))
        );
        for table in &engine.tables {
            match &table.error {
                None => {
                    let _ = writeln!(
                        out,
                        "    {:<12} {:>12} rows {:>10} ({})",
                        table.table,
                        format_number(table.rows),
                        secs(table.elapsed_seconds),
                        format_rate(table.rows, Duration::from_secs_f64(table.elapsed_seconds))
                    );
                }
                Some(e) => {
                    let _ = writeln!(
                        out,
                        "    {:<12} FAILED after {} rows: {}",
                        table.table,
                        format_number(table.rows),
                        e
                    );
                }
            }
        }
    }

    let _ = writeln!(
        out,
        "  Total (including cleanup): {}",
        secs(report.total_seconds)
    );
    out
}

pub fn render_bench(report: &BenchReport) -> String {
    let mut out = format!(
        "Performance tests (run {}, {} records per table):\n",
        report.run_id,
        format_number(report.record_count as u64)
    );

    for result in &report.results {
        let _ = writeln!(out, "\n--- Test {}: {} ---", result.id, result.title);
        for outcome in [&result.pg, &result.crate_db] {
            if !outcome.plan.is_empty() {
                let _ = writeln!(out, "  {} - {} EXPLAIN Plan:", outcome.engine, outcome.name);
                for line in &outcome.plan {
                    let _ = writeln!(out, "      {}", line);
                }
            }
            let _ = writeln!(out, "  {}", outcome_line(outcome));
        }
        for cleanup in &result.cleanup {
            let _ = writeln!(out, "  {}", outcome_line(cleanup));
        }
        if let Some(speedup) = result.speedup() {
            let _ = writeln!(out, "  PostgreSQL / CrateDB: {:.2}x", speedup);
        }
    }
    out
}

pub fn render_sync(report: &SyncReport) -> String {
    let mut out = String::from("Data synchronization (customers):\n");
    for phase in &report.phases {
        if phase.skipped {
            let _ = writeln!(out, "  {}: skipped (no customers)", phase.op);
            continue;
        }
        let _ = writeln!(
            out,
            "  {} customer_id {}: {}",
            phase.op,
            phase.customer_id.unwrap_or_default(),
            if phase.consistent { "CONSISTENT" } else { "DIVERGED" }
        );
        if let Some(before) = &phase.before {
            let _ = writeln!(out, "    PG Original:      {}", before);
        }
        if let Some(state) = &phase.pg_state {
            let _ = writeln!(out, "    PG Current:       {}", state);
        }
        match (&phase.crate_state, &phase.error) {
            (Some(state), _) => {
                let _ = writeln!(out, "    CrateDB Current:  {}", state);
            }
            (None, Some(e)) => {
                let _ = writeln!(out, "    CrateDB FAILED:   {}", e);
            }
            _ => {}
        }
    }
    out
}

pub fn render_health(result: &HealthCheckResult) -> String {
    let status = |ok: bool| if ok { "OK" } else { "FAILED" };
    let mut out = String::from("Health Check Results:\n");
    let _ = writeln!(
        out,
        "  PostgreSQL: {} ({}ms)",
        status(result.pg_connected),
        result.pg_latency_ms
    );
    if let Some(err) = &result.pg_error {
        let _ = writeln!(out, "    Error: {}", err);
    }
    let _ = writeln!(
        out,
        "  CrateDB: {} ({}ms)",
        status(result.crate_connected),
        result.crate_latency_ms
    );
    if let Some(err) = &result.crate_error {
        let _ = writeln!(out, "    Error: {}", err);
    }
    let _ = writeln!(
        out,
        "\n  Overall: {}",
        if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
    );
    out
}

pub fn print_setup(report: &SetupReport) {
    print!("{}", render_setup(report));
}

pub fn print_load(report: &LoadReport) {
    print!("{}", render_load(report));
}

pub fn print_bench(report: &BenchReport) {
    print!("{}", render_bench(report));
}

pub fn print_sync(report: &SyncReport) {
    print!("{}", render_sync(report));
}

pub fn print_health(result: &HealthCheckResult) {
    print!("{}", render_health(result));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::ScenarioResult;
    use crate::setup::{EngineSetup, TableOutcome};
    use chrono::Utc;

    fn outcome(engine: &str, duration: Option<f64>) -> TestOutcome {
        TestOutcome {
            engine: engine.into(),
            name: "Daily Order Count".into(),
            duration_seconds: duration,
            result: None,
            plan: vec![],
            error: duration.is_none().then(|| "timeout".to_string()),
        }
    }

    #[test]
    fn test_format_duration_units() {
        assert_eq!(format_duration(Duration::from_millis(2_500)), "2.50s");
        assert_eq!(format_duration(Duration::from_micros(12_300)), "12.3ms");
        assert_eq!(format_duration(Duration::from_micros(250)), "250µs");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(500, Duration::from_secs(1)), "500 rows/s");
        assert_eq!(format_rate(25_000, Duration::from_secs(2)), "12.5K rows/s");
        assert_eq!(format_rate(3_000_000, Duration::from_secs(1)), "3.00M rows/s");
        assert_eq!(format_rate(10, Duration::ZERO), "-");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000_000), "1,000,000");
    }

    #[test]
    fn test_render_bench_shows_speedup_and_failures() {
        let report = BenchReport {
            run_id: "run-1".into(),
            started_at: Utc::now(),
            record_count: 1_000,
            results: vec![
                ScenarioResult {
                    id: 3,
                    title: "Daily Order Count (Last 365 Days)".into(),
                    pg: outcome("PostgreSQL", Some(2.0)),
                    crate_db: outcome("CrateDB", Some(0.5)),
                    cleanup: vec![],
                },
                ScenarioResult {
                    id: 4,
                    title: "Full-Text Search".into(),
                    pg: outcome("PostgreSQL", Some(1.0)),
                    crate_db: outcome("CrateDB", None),
                    cleanup: vec![],
                },
            ],
        };

        let text = render_bench(&report);
        assert!(text.contains("--- Test 3: Daily Order Count (Last 365 Days) ---"));
        assert!(text.contains("PostgreSQL - Daily Order Count: 2.0000 seconds"));
        assert!(text.contains("PostgreSQL / CrateDB: 4.00x"));
        assert!(text.contains("CrateDB - Daily Order Count FAILED: timeout"));
        assert_eq!(text.matches("x\n").count(), 1);
    }

    #[test]
    fn test_render_setup_lists_failed_tables() {
        let report = SetupReport {
            engines: vec![EngineSetup {
                engine: "CrateDB".into(),
                tables: vec![
                    TableOutcome {
                        table: "customers".into(),
                        error: None,
                    },
                    TableOutcome {
                        table: "products".into(),
                        error: Some("analyzer missing".into()),
                    },
                ],
                elapsed_seconds: 0.25,
            }],
        };
        let text = render_setup(&report);
        assert!(text.contains("CrateDB: 1/2 tables in 250.0ms"));
        assert!(text.contains("products FAILED: analyzer missing"));
    }

    #[test]
    fn test_render_health() {
        let result = HealthCheckResult {
            pg_connected: true,
            pg_latency_ms: 3,
            pg_error: None,
            crate_connected: false,
            crate_latency_ms: 0,
            crate_error: Some("connection refused".into()),
            healthy: false,
        };
        let text = render_health(&result);
        assert!(text.contains("PostgreSQL: OK (3ms)"));
        assert!(text.contains("CrateDB: FAILED (0ms)"));
        assert!(text.contains("Error: connection refused"));
        assert!(text.contains("Overall: UNHEALTHY"));
    }
}
