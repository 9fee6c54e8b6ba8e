//! CrateDB engine over the HTTP `_sql` endpoint.
//!
//! Every statement is a `POST {url}/_sql` carrying either `args` (one
//! execution) or `bulk_args` (one execution per row). CrateDB auto-commits;
//! reads only see writes after the table has been refreshed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::{Engine, QueryResult};
use crate::config::{CrateDbConfig, DatasetConfig};
use crate::error::{BenchError, Result};
use crate::schema::{CrateDialect, Dialect, DialectImpl};
use crate::value::{SqlValue, ValueRow};

/// `rowcount` CrateDB reports for a bulk row that failed.
const BULK_ROW_FAILED: i64 = -2;

#[derive(Debug, Serialize)]
struct SqlRequest<'a> {
    stmt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bulk_args: Option<Vec<Vec<Value>>>,
}

/// Successful `_sql` response, plain or bulk.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SqlResponse {
    #[serde(default)]
    pub cols: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    #[serde(default)]
    pub rowcount: Option<i64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub results: Vec<BulkResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkResult {
    pub rowcount: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

/// Decode a `_sql` response body; error envelopes become [`BenchError::CrateDb`].
pub(crate) fn parse_response(status: u16, body: &str) -> Result<SqlResponse> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return Err(BenchError::cratedb(envelope.error.code, envelope.error.message));
    }
    if !(200..300).contains(&status) {
        return Err(BenchError::cratedb(
            None,
            format!("HTTP {}: {}", status, body.trim()),
        ));
    }
    Ok(serde_json::from_str(body)?)
}

impl SqlResponse {
    /// Rows of a bulk response that CrateDB marked as failed.
    pub(crate) fn failed_rows(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.rowcount == BULK_ROW_FAILED)
            .count()
    }

    fn into_query_result(self) -> QueryResult {
        let rows: Vec<ValueRow> = self
            .rows
            .iter()
            .map(|r| r.iter().map(SqlValue::from_json).collect())
            .collect();
        QueryResult {
            columns: self.cols,
            rowcount: self.rowcount.unwrap_or(rows.len() as i64),
            rows,
        }
    }
}

fn json_args(params: &[SqlValue]) -> Vec<Value> {
    params.iter().map(SqlValue::to_json).collect()
}

/// CrateDB engine.
pub struct CrateEngine {
    client: Client,
    endpoint: String,
    user: Option<String>,
    password: Option<String>,
    dialect: CrateDialect,
    chunk_size: usize,
}

impl CrateEngine {
    /// Build the HTTP client. No request is sent.
    pub fn new(config: &CrateDbConfig, dataset: &DatasetConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("pg-cratedb-bench/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.sql_endpoint(),
            user: config.user.clone(),
            password: config.password.clone(),
            dialect: CrateDialect::new(),
            chunk_size: dataset.get_crate_bulk_chunk_size().max(1),
        })
    }

    async fn post(&self, request: &SqlRequest<'_>) -> Result<SqlResponse> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(user) = &self.user {
            builder = builder.basic_auth(user, self.password.as_deref());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        let parsed = parse_response(status, &body)?;

        if let Some(ms) = parsed.duration {
            debug!("CrateDB: {:.3} ms server time for {}", ms, request.stmt);
        }
        Ok(parsed)
    }

    /// Run one statement with plain args.
    pub(crate) async fn sql(&self, stmt: &str, params: &[SqlValue]) -> Result<SqlResponse> {
        self.post(&SqlRequest {
            stmt,
            args: Some(json_args(params)),
            bulk_args: None,
        })
        .await
    }

    /// Run one statement once per row.
    pub(crate) async fn bulk(&self, stmt: &str, rows: &[ValueRow]) -> Result<SqlResponse> {
        self.post(&SqlRequest {
            stmt,
            args: None,
            bulk_args: Some(rows.iter().map(|r| json_args(r)).collect()),
        })
        .await
    }
}

#[async_trait]
impl Engine for CrateEngine {
    fn name(&self) -> &str {
        "CrateDB"
    }

    fn dialect(&self) -> DialectImpl {
        DialectImpl::Crate(self.dialect)
    }

    async fn test_connection(&self) -> Result<()> {
        self.sql("SELECT 1", &[]).await?;
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let response = self.sql(sql, params).await?;
        // DDL reports -1 or omits the count.
        Ok(response.rowcount.unwrap_or(0).max(0) as u64)
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        Ok(self.sql(sql, params).await?.into_query_result())
    }

    async fn bulk_insert(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[ValueRow],
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let stmt = self.dialect.insert_sql(table, columns);
        let mut inserted = 0u64;

        for (i, chunk) in rows.chunks(self.chunk_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(BenchError::Cancelled);
            }

            let offset = i * self.chunk_size;
            let outcome = self.bulk(&stmt, chunk).await.and_then(|response| {
                match response.failed_rows() {
                    0 => Ok(()),
                    failed => Err(BenchError::cratedb(
                        None,
                        format!("{} of {} rows rejected", failed, chunk.len()),
                    )),
                }
            });

            if let Err(e) = outcome {
                error!(
                    "CrateDB bulk insert into {} failed at chunk offset {} ({} rows inserted): {}",
                    table, offset, inserted, e
                );
                return Err(if inserted > 0 {
                    BenchError::bulk_insert(table, inserted, e)
                } else {
                    e
                });
            }

            inserted += chunk.len() as u64;
            debug!("{}: {} of {} rows inserted", table, inserted, rows.len());
        }

        Ok(inserted)
    }

    async fn clear_table(&self, table: &str) -> Result<()> {
        let sql = format!("DELETE FROM {}", self.dialect.quote_ident(table));
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

    async fn refresh(&self, table: &str) -> Result<()> {
        self.execute(&self.dialect.refresh_sql(table), &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_select_response() {
        let body = r#"{"cols":["count(*)"],"rows":[[42]],"rowcount":1,"duration":1.5}"#;
        let response = parse_response(200, body).unwrap();
        assert_eq!(response.cols, vec!["count(*)"]);
        assert_eq!(response.duration, Some(1.5));

        let result = response.into_query_result();
        assert_eq!(result.first_value(), Some(&SqlValue::BigInt(42)));
        assert_eq!(result.rowcount, 1);
    }

    #[test]
    fn test_parse_error_envelope() {
        let body = r#"{"error":{"message":"RelationUnknown[Relation 'foo' unknown]","code":4041}}"#;
        let err = parse_response(404, body).unwrap_err();
        match err {
            BenchError::CrateDb { code, message } => {
                assert_eq!(code, Some(4041));
                assert!(message.contains("foo"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_non_json_failure() {
        let err = parse_response(502, "Bad Gateway").unwrap_err();
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn test_bulk_failed_rows() {
        let body = r#"{"cols":[],"duration":3.1,"results":[{"rowcount":1},{"rowcount":-2},{"rowcount":1}]}"#;
        let response = parse_response(200, body).unwrap();
        assert_eq!(response.failed_rows(), 1);
    }

    #[test]
    fn test_request_serialization() {
        let request = SqlRequest {
            stmt: "SELECT ?",
            args: Some(json_args(&[SqlValue::Int(1), SqlValue::text("a")])),
            bulk_args: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"stmt": "SELECT ?", "args": [1, "a"]})
        );

        let request = SqlRequest {
            stmt: "INSERT",
            args: None,
            bulk_args: Some(vec![vec![json!(1)], vec![json!(2)]]),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"stmt": "INSERT", "bulk_args": [[1], [2]]})
        );
    }

    #[test]
    fn test_new_uses_sql_endpoint() {
        let config = CrateDbConfig {
            url: "http://localhost:4203/".into(),
            user: None,
            password: None,
            timeout_secs: 5,
        };
        let engine = CrateEngine::new(&config, &DatasetConfig::default()).unwrap();
        assert_eq!(engine.endpoint, "http://localhost:4203/_sql");
        assert_eq!(engine.name(), "CrateDB");
    }
}
