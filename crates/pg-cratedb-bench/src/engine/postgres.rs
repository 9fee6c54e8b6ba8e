//! PostgreSQL engine over a deadpool-postgres pool.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use futures::SinkExt;
use tokio_postgres::types::ToSql;
use tokio_postgres::Config as PgConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::tls::{SslMode, TlsBuilder};
use super::{Engine, QueryResult};
use crate::config::{DatasetConfig, PgLoadMethod, PostgresConfig};
use crate::error::{BenchError, Result};
use crate::schema::{Dialect, DialectImpl, PostgresDialect};
use crate::value::{SqlValue, ValueRow};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Connections kept by the pool. Phases are sequential so a few suffice.
const POOL_MAX_SIZE: usize = 4;

/// Bind parameter limit of the extended query protocol.
pub(crate) const MAX_BIND_PARAMS: usize = 65_535;

/// Rows sent per COPY buffer flush.
const COPY_FLUSH_ROWS: usize = 10_000;

/// PostgreSQL engine.
pub struct PgEngine {
    pool: Pool,
    dialect: PostgresDialect,
    batch_size: usize,
    load_method: PgLoadMethod,
}

impl PgEngine {
    /// Build the pool and verify a connection can be made.
    pub async fn connect(config: &PostgresConfig, dataset: &DatasetConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        // Long bulk loads keep connections busy for minutes.
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let ssl_mode = SslMode::parse(&config.ssl_mode)?;
        let pool = match TlsBuilder::new(ssl_mode).build()? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(POOL_MAX_SIZE)
                    .build()
                    .map_err(|e| BenchError::pool(e, "creating PostgreSQL pool"))?
            }
            Some(tls) => {
                let mgr = Manager::from_config(pg_config, tls, mgr_config);
                Pool::builder(mgr)
                    .max_size(POOL_MAX_SIZE)
                    .build()
                    .map_err(|e| BenchError::pool(e, "creating PostgreSQL pool"))?
            }
        };

        let engine = Self {
            pool,
            dialect: PostgresDialect::new(),
            batch_size: dataset.get_pg_batch_size(),
            load_method: dataset.pg_load_method,
        };
        engine.test_connection().await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(engine)
    }

    async fn client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| BenchError::pool(e, context.to_string()))
    }

    /// Multi-row VALUES inserts inside one transaction.
    async fn insert_values(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[ValueRow],
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let page = rows_per_page(self.batch_size, columns.len());
        let mut client = self.client("getting connection for bulk insert").await?;
        let tx = client.transaction().await?;

        let full_page_sql = self.dialect.multi_row_insert_sql(table, columns, page);
        let full_page = tx.prepare(&full_page_sql).await?;

        let mut inserted = 0u64;
        for chunk in rows.chunks(page) {
            if cancel.is_cancelled() {
                // Dropping the transaction rolls the table back.
                return Err(BenchError::Cancelled);
            }

            let params: Vec<&(dyn ToSql + Sync)> = chunk
                .iter()
                .flat_map(|row| row.iter().map(|v| v as &(dyn ToSql + Sync)))
                .collect();

            inserted += if chunk.len() == page {
                tx.execute(&full_page, &params).await?
            } else {
                let sql = self.dialect.multi_row_insert_sql(table, columns, chunk.len());
                tx.execute(sql.as_str(), &params).await?
            };
            debug!("{}: {} of {} rows sent", table, inserted, rows.len());
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// COPY FROM STDIN (text format) inside one transaction.
    async fn insert_copy(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[ValueRow],
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let mut client = self.client("getting connection for COPY").await?;
        let tx = client.transaction().await?;

        let sink = tx.copy_in(&self.dialect.copy_in_sql(table, columns)).await?;
        futures::pin_mut!(sink);

        let mut buf = BytesMut::with_capacity(1024 * 1024);
        for (i, row) in rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    buf.put_u8(b'\t');
                }
                buf.extend_from_slice(value.to_copy_text().as_bytes());
            }
            buf.put_u8(b'\n');

            if (i + 1) % COPY_FLUSH_ROWS == 0 || i + 1 == rows.len() {
                if cancel.is_cancelled() {
                    return Err(BenchError::Cancelled);
                }
                sink.send(buf.split().freeze()).await?;
            }
        }

        let copied = sink.finish().await?;
        tx.commit().await?;
        Ok(copied)
    }
}

/// Rows per VALUES page: the batch size, capped by the bind parameter limit.
pub(crate) fn rows_per_page(batch_size: usize, width: usize) -> usize {
    let by_params = MAX_BIND_PARAMS / width.max(1);
    batch_size.min(by_params).max(1)
}

fn params_of(values: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl Engine for PgEngine {
    fn name(&self) -> &str {
        "PostgreSQL"
    }

    fn dialect(&self) -> DialectImpl {
        DialectImpl::Postgres(self.dialect)
    }

    async fn test_connection(&self) -> Result<()> {
        let client = self.client("testing PostgreSQL connection").await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let client = self.client("getting connection for execute").await?;
        Ok(client.execute(sql, &params_of(params)).await?)
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let client = self.client("getting connection for query").await?;
        let stmt = client.prepare(sql).await?;
        let rows = client.query(&stmt, &params_of(params)).await?;

        let columns = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let rows: Vec<ValueRow> = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| SqlValue::from_pg_row(row, i)).collect())
            .collect();

        Ok(QueryResult {
            columns,
            rowcount: rows.len() as i64,
            rows,
        })
    }

    async fn bulk_insert(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[ValueRow],
        cancel: &CancellationToken,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        match self.load_method {
            PgLoadMethod::Values => self.insert_values(table, columns, rows, cancel).await,
            PgLoadMethod::Copy => self.insert_copy(table, columns, rows, cancel).await,
        }
    }

    async fn clear_table(&self, table: &str) -> Result<()> {
        let sql = format!(
            "TRUNCATE TABLE {} RESTART IDENTITY CASCADE",
            self.dialect.quote_ident(table)
        );
        self.execute(&sql, &[]).await?;
        Ok(())
    }

    async fn explain(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<String>> {
        let plan = self.query(&format!("EXPLAIN {}", sql), params).await?;
        Ok(plan
            .rows
            .iter()
            .filter_map(|r| r.first().map(|v| v.to_string()))
            .collect())
    }

    async fn refresh(&self, _table: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_per_page_uses_batch_size() {
        assert_eq!(rows_per_page(1_000, 5), 1_000);
    }

    #[test]
    fn test_rows_per_page_capped_by_bind_limit() {
        assert_eq!(rows_per_page(100_000, 5), 13_107);
        assert!(rows_per_page(100_000, 5) * 5 <= MAX_BIND_PARAMS);
    }

    #[test]
    fn test_rows_per_page_never_zero() {
        assert_eq!(rows_per_page(0, 5), 1);
        assert_eq!(rows_per_page(10, 0), 10);
    }
}
