//! Database engine clients.
//!
//! Both engines are driven through the [`Engine`] trait so the setup, load,
//! bench and sync phases are written once. [`PgEngine`] talks to PostgreSQL
//! through a deadpool-postgres pool; [`CrateEngine`] talks to CrateDB's HTTP
//! `_sql` endpoint.

mod cratedb;
mod postgres;
mod tls;

pub use cratedb::CrateEngine;
pub use postgres::PgEngine;
pub use tls::{SslMode, TlsBuilder};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::schema::DialectImpl;
use crate::value::{SqlValue, ValueRow};

/// Rows returned by a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<ValueRow>,
    /// Affected or returned row count as reported by the engine.
    pub rowcount: i64,
}

impl QueryResult {
    /// First column of the first row.
    pub fn first_value(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|r| r.first())
    }

    /// First row, if any.
    pub fn first_row(&self) -> Option<&ValueRow> {
        self.rows.first()
    }
}

/// Operations every benchmarked engine supports.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Display name ("PostgreSQL" or "CrateDB").
    fn name(&self) -> &str;

    /// SQL dialect used for DDL and placeholders.
    fn dialect(&self) -> DialectImpl;

    /// Round-trip a trivial statement.
    async fn test_connection(&self) -> Result<()>;

    /// Execute a statement, returning the affected row count.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Execute a statement and collect its rows.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult>;

    /// Insert all rows, batched per the engine's configured size.
    async fn bulk_insert(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[ValueRow],
        cancel: &CancellationToken,
    ) -> Result<u64>;

    /// Remove every row of a table.
    async fn clear_table(&self, table: &str) -> Result<()>;

    /// Plan lines for a statement.
    async fn explain(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<String>>;

    /// Make recent writes visible to subsequent reads. No-op where writes are
    /// immediately visible.
    async fn refresh(&self, table: &str) -> Result<()>;
}

/// The two connected engines.
pub struct Engines {
    pub pg: PgEngine,
    pub crate_db: CrateEngine,
}

impl Engines {
    /// Connect to both engines, PostgreSQL first.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pg = PgEngine::connect(&config.postgres, &config.dataset).await?;
        let crate_db = CrateEngine::new(&config.cratedb, &config.dataset)?;
        crate_db.test_connection().await?;
        info!("Connected to CrateDB at {}", config.cratedb.url);
        Ok(Self { pg, crate_db })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory engine for exercising the phases without a server.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::error::BenchError;
    use crate::schema::{CrateDialect, PostgresDialect};

    /// Records every statement and answers queries from a script.
    pub struct ScriptedEngine {
        name: &'static str,
        dialect: DialectImpl,
        pub statements: Mutex<Vec<String>>,
        pub params: Mutex<Vec<Vec<SqlValue>>>,
        pub inserted: Mutex<Vec<(String, usize)>>,
        responses: Mutex<VecDeque<QueryResult>>,
        fail_on: Mutex<Vec<String>>,
        partial: Mutex<Option<(String, u64)>>,
    }

    impl ScriptedEngine {
        pub fn postgres() -> Self {
            Self::new("PostgreSQL", DialectImpl::Postgres(PostgresDialect::new()))
        }

        pub fn cratedb() -> Self {
            Self::new("CrateDB", DialectImpl::Crate(CrateDialect::new()))
        }

        fn new(name: &'static str, dialect: DialectImpl) -> Self {
            Self {
                name,
                dialect,
                statements: Mutex::new(Vec::new()),
                params: Mutex::new(Vec::new()),
                inserted: Mutex::new(Vec::new()),
                responses: Mutex::new(VecDeque::new()),
                fail_on: Mutex::new(Vec::new()),
                partial: Mutex::new(None),
            }
        }

        /// Queue a result for the next `query` call.
        pub fn push_rows(&self, rows: Vec<ValueRow>) {
            let rowcount = rows.len() as i64;
            self.responses.lock().unwrap().push_back(QueryResult {
                columns: vec![],
                rows,
                rowcount,
            });
        }

        /// Fail every statement containing `fragment`.
        pub fn fail_on(&self, fragment: &str) {
            self.fail_on.lock().unwrap().push(fragment.to_string());
        }

        /// Fail the bulk insert into `table` after `rows` rows were committed.
        pub fn fail_bulk_after(&self, table: &str, rows: u64) {
            *self.partial.lock().unwrap() = Some((table.to_string(), rows));
        }

        pub fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }

        fn record(&self, sql: &str, params: &[SqlValue]) -> Result<()> {
            self.statements.lock().unwrap().push(sql.to_string());
            self.params.lock().unwrap().push(params.to_vec());
            let failing = self
                .fail_on
                .lock()
                .unwrap()
                .iter()
                .any(|f| sql.contains(f.as_str()));
            if failing {
                return Err(BenchError::cratedb(None, format!("scripted failure: {}", sql)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Engine for ScriptedEngine {
        fn name(&self) -> &str {
            self.name
        }

        fn dialect(&self) -> DialectImpl {
            self.dialect
        }

        async fn test_connection(&self) -> Result<()> {
            self.record("SELECT 1", &[])
        }

        async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
            self.record(sql, params)?;
            Ok(1)
        }

        async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
            self.record(sql, params)?;
            Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn bulk_insert(
            &self,
            table: &str,
            _columns: &[&str],
            rows: &[ValueRow],
            cancel: &CancellationToken,
        ) -> Result<u64> {
            if cancel.is_cancelled() {
                return Err(BenchError::Cancelled);
            }
            self.record(&format!("BULK INSERT {}", table), &[])?;
            if let Some((t, committed)) = self.partial.lock().unwrap().clone() {
                if t == table {
                    let cause = BenchError::cratedb(None, "scripted chunk failure");
                    return Err(BenchError::bulk_insert(table, committed, cause));
                }
            }
            self.inserted
                .lock()
                .unwrap()
                .push((table.to_string(), rows.len()));
            Ok(rows.len() as u64)
        }

        async fn clear_table(&self, table: &str) -> Result<()> {
            self.record(&format!("CLEAR {}", table), &[])
        }

        async fn explain(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<String>> {
            self.record(&format!("EXPLAIN {}", sql), params)?;
            Ok(vec!["Plan".to_string()])
        }

        async fn refresh(&self, table: &str) -> Result<()> {
            self.record(&format!("REFRESH {}", table), &[])
        }
    }
}
