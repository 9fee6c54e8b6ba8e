//! # pg-cratedb-bench
//!
//! Side-by-side workload library for PostgreSQL and CrateDB.
//!
//! The same e-commerce schema (customers, products, orders, order items,
//! inventory) is created in both engines and filled with identical fake data.
//! On top of that the library provides:
//!
//! - **Schema setup** with per-engine DDL dialects
//! - **Bulk loading** via multi-row INSERT or COPY on PostgreSQL and the
//!   `_sql` bulk endpoint on CrateDB
//! - **Query benchmarks** with optional EXPLAIN plans
//! - **Dual-write sync** checks for UPDATE, INSERT and DELETE
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_cratedb_bench::{run_load, Config, Engines, LoadOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> pg_cratedb_bench::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let engines = Engines::connect(&config).await?;
//!     let options = LoadOptions::from_config(&config.dataset);
//!     let report = run_load(&engines.pg, &engines.crate_db, &options, &CancellationToken::new()).await?;
//!     println!("Loaded {} tables", report.engines.len());
//!     Ok(())
//! }
//! ```

pub mod bench;
pub mod config;
pub mod datagen;
pub mod engine;
pub mod error;
pub mod health;
pub mod load;
pub mod report;
pub mod schema;
pub mod setup;
pub mod sync;
pub mod value;

// Re-exports for convenient access
pub use bench::{run_bench, BenchOptions, BenchReport};
pub use config::{Config, SystemResources};
pub use engine::{CrateEngine, Engine, Engines, PgEngine};
pub use error::{BenchError, Result};
pub use health::{health_check, health_check_config, HealthCheckResult};
pub use load::{run_load, LoadOptions, LoadReport};
pub use setup::{run_setup, SetupReport};
pub use sync::{run_sync, SyncOptions, SyncReport};
pub use value::{SqlValue, ValueRow};
