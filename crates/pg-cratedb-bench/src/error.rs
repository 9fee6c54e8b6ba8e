//! Error types for the benchmark library.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for PostgreSQL errors.
pub const EXIT_POSTGRES_ERROR: u8 = 2;
/// Exit code for CrateDB errors.
pub const EXIT_CRATEDB_ERROR: u8 = 3;
/// Exit code for data generation errors.
pub const EXIT_GENERATE_ERROR: u8 = 4;
/// Exit code for synchronization errors.
pub const EXIT_SYNC_ERROR: u8 = 5;
/// Exit code when the run was cancelled.
pub const EXIT_CANCELLED: u8 = 6;
/// Exit code for IO errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code for JSON errors.
pub const EXIT_JSON_ERROR: u8 = 8;

/// Main error type for benchmark operations.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// PostgreSQL connection or query error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// CrateDB rejected a statement
    #[error("CrateDB error{}: {message}", code.map(|c| format!(" ({})", c)).unwrap_or_default())]
    CrateDb { code: Option<i64>, message: String },

    /// HTTP transport error talking to CrateDB
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Bulk insert stopped after earlier chunks were already committed
    #[error("Bulk insert into {table} stopped after {inserted} rows: {cause}")]
    BulkInsert {
        table: String,
        inserted: u64,
        cause: Box<BenchError>,
    },

    /// Fake data generation failed
    #[error("Data generation failed: {0}")]
    Generate(String),

    /// Synchronization demo failed
    #[error("Sync failed: {0}")]
    Sync(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Run cancelled")]
    Cancelled,
}

impl BenchError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        BenchError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a CrateDB error
    pub fn cratedb(code: Option<i64>, message: impl Into<String>) -> Self {
        BenchError::CrateDb {
            code,
            message: message.into(),
        }
    }

    /// Wrap a bulk insert failure that left `inserted` rows committed.
    pub fn bulk_insert(table: impl Into<String>, inserted: u64, cause: BenchError) -> Self {
        BenchError::BulkInsert {
            table: table.into(),
            inserted,
            cause: Box::new(cause),
        }
    }

    /// Rows that stayed committed despite the failure.
    pub fn committed_rows(&self) -> u64 {
        match self {
            BenchError::BulkInsert { inserted, .. } => *inserted,
            _ => 0,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            BenchError::Config(_) | BenchError::Yaml(_) => EXIT_CONFIG_ERROR,
            BenchError::Postgres(_) | BenchError::Pool { .. } => EXIT_POSTGRES_ERROR,
            BenchError::CrateDb { .. } | BenchError::Http(_) => EXIT_CRATEDB_ERROR,
            BenchError::BulkInsert { cause, .. } => cause.exit_code(),
            BenchError::Generate(_) => EXIT_GENERATE_ERROR,
            BenchError::Sync(_) => EXIT_SYNC_ERROR,
            BenchError::Cancelled => EXIT_CANCELLED,
            BenchError::Io(_) => EXIT_IO_ERROR,
            BenchError::Json(_) => EXIT_JSON_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for benchmark operations.
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(BenchError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(BenchError::pool("x", "ctx").exit_code(), EXIT_POSTGRES_ERROR);
        assert_eq!(BenchError::cratedb(Some(4000), "x").exit_code(), EXIT_CRATEDB_ERROR);
        assert_eq!(BenchError::Cancelled.exit_code(), EXIT_CANCELLED);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(BenchError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_bulk_insert_keeps_committed_rows() {
        let err = BenchError::bulk_insert("orders", 200, BenchError::cratedb(None, "3 of 100 rows rejected"));
        assert_eq!(err.committed_rows(), 200);
        assert_eq!(err.exit_code(), EXIT_CRATEDB_ERROR);
        assert_eq!(
            err.to_string(),
            "Bulk insert into orders stopped after 200 rows: CrateDB error: 3 of 100 rows rejected"
        );
        assert_eq!(BenchError::Cancelled.committed_rows(), 0);
    }

    #[test]
    fn test_cratedb_error_display() {
        let err = BenchError::cratedb(Some(4043), "Relation 'foo' unknown");
        assert_eq!(
            err.to_string(),
            "CrateDB error (4043): Relation 'foo' unknown"
        );

        let err = BenchError::cratedb(None, "boom");
        assert_eq!(err.to_string(), "CrateDB error: boom");
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = BenchError::pool("timed out", "creating PostgreSQL pool");
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Pool error: timed out"));
        assert!(detailed.contains("creating PostgreSQL pool"));
    }
}
