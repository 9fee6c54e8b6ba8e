//! Configuration validation.

use super::Config;
use crate::engine::SslMode;
use crate::error::{BenchError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // PostgreSQL validation
    if config.postgres.host.is_empty() {
        return Err(BenchError::Config("postgres.host is required".into()));
    }
    if config.postgres.database.is_empty() {
        return Err(BenchError::Config("postgres.database is required".into()));
    }
    if config.postgres.user.is_empty() {
        return Err(BenchError::Config("postgres.user is required".into()));
    }
    SslMode::parse(&config.postgres.ssl_mode)?;

    // CrateDB validation
    let url = config.cratedb.url.to_lowercase();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(BenchError::Config(format!(
            "cratedb.url must start with http:// or https://, got '{}'",
            config.cratedb.url
        )));
    }

    // Dataset validation - batch sizes only checked if explicitly set
    if config.dataset.record_count == 0 {
        return Err(BenchError::Config(
            "dataset.record_count must be at least 1".into(),
        ));
    }
    if let Some(0) = config.dataset.pg_batch_size {
        return Err(BenchError::Config(
            "dataset.pg_batch_size must be at least 1".into(),
        ));
    }
    if let Some(0) = config.dataset.crate_bulk_chunk_size {
        return Err(BenchError::Config(
            "dataset.crate_bulk_chunk_size must be at least 1".into(),
        ));
    }

    // Bench validation
    if config.bench.bulk_insert_count == 0 {
        return Err(BenchError::Config(
            "bench.bulk_insert_count must be at least 1".into(),
        ));
    }
    // Bulk ingestion ids run up to record_count + bulk_insert_count.
    let last_id = config
        .dataset
        .record_count
        .saturating_add(config.bench.bulk_insert_count);
    if last_id > i32::MAX as usize {
        return Err(BenchError::Config(format!(
            "dataset.record_count + bench.bulk_insert_count must not exceed {} (INTEGER ids)",
            i32::MAX
        )));
    }
    if config.bench.search_term.trim().is_empty() {
        return Err(BenchError::Config("bench.search_term is required".into()));
    }

    // Sync validation
    if config.sync.unique_email_retries == 0 {
        return Err(BenchError::Config(
            "sync.unique_email_retries must be at least 1".into(),
        ));
    }

    Ok(())
}
