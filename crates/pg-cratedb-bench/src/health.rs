//! Connectivity check for both engines.

use std::time::Instant;

use serde::Serialize;

use crate::config::Config;
use crate::engine::{CrateEngine, Engine, PgEngine};

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub pg_connected: bool,
    pub pg_latency_ms: u64,
    pub pg_error: Option<String>,
    pub crate_connected: bool,
    pub crate_latency_ms: u64,
    pub crate_error: Option<String>,
    pub healthy: bool,
}

async fn probe<E: Engine + ?Sized>(engine: &E) -> (bool, u64, Option<String>) {
    let start = Instant::now();
    let result = engine.test_connection().await;
    let latency = start.elapsed().as_millis() as u64;
    match result {
        Ok(()) => (true, latency, None),
        Err(e) => (false, latency, Some(e.to_string())),
    }
}

/// Round-trip `SELECT 1` on each engine.
pub async fn health_check<P, C>(pg: &P, crate_db: &C) -> HealthCheckResult
where
    P: Engine + ?Sized,
    C: Engine + ?Sized,
{
    let (pg_connected, pg_latency_ms, pg_error) = probe(pg).await;
    let (crate_connected, crate_latency_ms, crate_error) = probe(crate_db).await;

    HealthCheckResult {
        pg_connected,
        pg_latency_ms,
        pg_error,
        crate_connected,
        crate_latency_ms,
        crate_error,
        healthy: pg_connected && crate_connected,
    }
}

/// Health check straight from configuration. Connection setup failures
/// count as an unreachable engine rather than an error.
pub async fn health_check_config(config: &Config) -> HealthCheckResult {
    let start = Instant::now();
    let (pg_connected, pg_latency_ms, pg_error) =
        match PgEngine::connect(&config.postgres, &config.dataset).await {
            Ok(_) => (true, start.elapsed().as_millis() as u64, None),
            Err(e) => (false, start.elapsed().as_millis() as u64, Some(e.to_string())),
        };

    let (crate_connected, crate_latency_ms, crate_error) =
        match CrateEngine::new(&config.cratedb, &config.dataset) {
            Ok(engine) => probe(&engine).await,
            Err(e) => (false, 0, Some(e.to_string())),
        };

    HealthCheckResult {
        pg_connected,
        pg_latency_ms,
        pg_error,
        crate_connected,
        crate_latency_ms,
        crate_error,
        healthy: pg_connected && crate_connected,
    }
}
