//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration back to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl PostgresConfig {
    /// Build a libpq-style connection string with the password redacted.
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password=[REDACTED] sslmode={}",
            self.host, self.port, self.database, self.user, self.ssl_mode
        )
    }
}

impl CrateDbConfig {
    /// URL of the `_sql` endpoint.
    pub fn sql_endpoint(&self) -> String {
        format!("{}/_sql", self.url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
postgres:
  host: localhost
  user: postgres
  password: secret
cratedb:
  url: http://localhost:4203/
"#;

    #[test]
    fn test_minimal_yaml_gets_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.postgres.port, 5436);
        assert_eq!(config.postgres.database, "postgres");
        assert_eq!(config.postgres.ssl_mode, "disable");
        assert_eq!(config.cratedb.timeout_secs, 300);
        assert_eq!(config.dataset.record_count, 1_000_000);
        assert_eq!(config.bench.bulk_insert_count, 100_000);
        assert_eq!(config.bench.search_term, "lorem");
        assert_eq!(config.sync.unique_email_retries, 100);
    }

    #[test]
    fn test_sql_endpoint_strips_trailing_slash() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.cratedb.sql_endpoint(), "http://localhost:4203/_sql");
    }

    #[test]
    fn test_connection_string_hides_password() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let conn = config.postgres.connection_string();
        assert!(conn.contains("port=5436"));
        assert!(!conn.contains("secret"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", MINIMAL).unwrap();
        writeln!(file, "dataset:\n  record_count: 500\n  pg_load_method: copy").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.dataset.record_count, 500);
        assert_eq!(config.dataset.pg_load_method, PgLoadMethod::Copy);
    }

    #[test]
    fn test_yaml_round_trip_preserves_explicit_values() {
        let mut config = Config::from_yaml(MINIMAL).unwrap();
        config.dataset.seed = Some(7);
        let yaml = config.to_yaml().unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.dataset.seed, Some(7));
        assert_eq!(parsed.postgres.password, "secret");
    }

    #[test]
    fn test_record_count_past_integer_ids_is_rejected() {
        let yaml = format!(
            "{}dataset:\n  record_count: 3000000000\nbench:\n  bulk_insert_count: 2\n",
            MINIMAL
        );
        assert!(matches!(
            Config::from_yaml(&yaml),
            Err(crate::error::BenchError::Config(_))
        ));
    }

    #[test]
    fn test_missing_section_is_error() {
        assert!(Config::from_yaml("postgres:\n  host: x\n  user: y\n").is_err());
    }
}
