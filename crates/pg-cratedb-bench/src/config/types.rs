//! Configuration type definitions with auto-tuning based on system resources.

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::info;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in GB.
    pub total_memory_gb: f64,
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        let total_memory_gb = sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0);
        let cpu_cores = sys.cpus().len();

        Self {
            total_memory_gb,
            cpu_cores,
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            self.total_memory_gb, self.cpu_cores
        );
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// PostgreSQL connection.
    pub postgres: PostgresConfig,

    /// CrateDB connection.
    pub cratedb: CrateDbConfig,

    /// Fake dataset and bulk load settings.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Query benchmark settings.
    #[serde(default)]
    pub bench: BenchConfig,

    /// Synchronization demo settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.dataset = self.dataset.with_auto_tuning(&resources);
        self
    }
}

/// PostgreSQL connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5436).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name (default: "postgres").
    #[serde(default = "default_pg_database")]
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// CrateDB connection configuration (HTTP endpoint).
#[derive(Clone, Serialize, Deserialize)]
pub struct CrateDbConfig {
    /// Base URL of the HTTP endpoint, e.g. `http://localhost:4203`.
    pub url: String,

    /// Username for basic auth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password for basic auth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Request timeout in seconds (default: 300).
    #[serde(default = "default_crate_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for CrateDbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrateDbConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// How rows are pushed into PostgreSQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PgLoadMethod {
    /// Multi-row INSERT ... VALUES pages.
    #[default]
    Values,

    /// COPY ... FROM STDIN in text format.
    Copy,
}

/// Fake dataset and bulk load configuration.
/// Batch sizes use Option<T> to distinguish between "not set" (use auto-tuned
/// default) and "explicitly set" (use provided value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Rows generated per table.
    #[serde(default = "default_record_count")]
    pub record_count: usize,

    /// RNG seed for reproducible datasets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Rows per PostgreSQL page. Auto-tuned based on RAM if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_batch_size: Option<usize>,

    /// Rows per CrateDB bulk request. Auto-tuned based on RAM if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crate_bulk_chunk_size: Option<usize>,

    /// PostgreSQL load path (default: values).
    #[serde(default)]
    pub pg_load_method: PgLoadMethod,

    /// Run REFRESH TABLE in CrateDB after each loaded table (default: true).
    #[serde(default = "default_true")]
    pub refresh_after_load: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            record_count: default_record_count(),
            seed: None,
            pg_batch_size: None,
            crate_bulk_chunk_size: None,
            pg_load_method: PgLoadMethod::default(),
            refresh_after_load: true,
        }
    }
}

impl DatasetConfig {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that are None (not explicitly set).
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        let batch = tuned_batch_size(resources.total_memory_gb);

        if self.pg_batch_size.is_none() {
            self.pg_batch_size = Some(batch);
        }
        if self.crate_bulk_chunk_size.is_none() {
            self.crate_bulk_chunk_size = Some(batch);
        }

        info!(
            "Auto-tuned config: pg_batch_size={}, crate_bulk_chunk_size={}",
            self.get_pg_batch_size(),
            self.get_crate_bulk_chunk_size(),
        );

        self
    }

    pub fn get_pg_batch_size(&self) -> usize {
        self.pg_batch_size.unwrap_or(100_000)
    }

    pub fn get_crate_bulk_chunk_size(&self) -> usize {
        self.crate_bulk_chunk_size.unwrap_or(100_000)
    }
}

/// Rows per batch: 25K per 4GB of RAM, clamped to 10K..200K.
pub(crate) fn tuned_batch_size(ram_gb: f64) -> usize {
    ((ram_gb / 4.0) as usize * 25_000).clamp(10_000, 200_000)
}

/// Query benchmark configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Extra customers inserted by the bulk ingestion test.
    #[serde(default = "default_bulk_insert_count")]
    pub bulk_insert_count: usize,

    /// Term for the full-text search test.
    #[serde(default = "default_search_term")]
    pub search_term: String,

    /// Print CrateDB EXPLAIN plans for the join tests.
    #[serde(default = "default_true")]
    pub explain: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            bulk_insert_count: default_bulk_insert_count(),
            search_term: default_search_term(),
            explain: true,
        }
    }
}

/// Synchronization demo configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Lower bound for new customer ids, from earlier bulk tests.
    #[serde(default = "default_ten_thousand")]
    pub bulk_insert_test_count: i64,

    /// Lower bound for new customer ids, from earlier concurrent tests.
    #[serde(default = "default_ten_thousand")]
    pub concurrent_insert_count: i64,

    /// Attempts at finding an email not yet present in PostgreSQL.
    #[serde(default = "default_email_retries")]
    pub unique_email_retries: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bulk_insert_test_count: default_ten_thousand(),
            concurrent_insert_count: default_ten_thousand(),
            unique_email_retries: default_email_retries(),
        }
    }
}

// Default value functions for serde
fn default_pg_port() -> u16 {
    5436
}

fn default_pg_database() -> String {
    "postgres".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_crate_timeout() -> u64 {
    300
}

fn default_record_count() -> usize {
    1_000_000
}

fn default_bulk_insert_count() -> usize {
    100_000
}

fn default_search_term() -> String {
    "lorem".to_string()
}

fn default_ten_thousand() -> i64 {
    10_000
}

fn default_email_retries() -> usize {
    100
}

fn default_true() -> bool {
    true
}
