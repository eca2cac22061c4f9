//! Query execution and result shaping.
//!
//! Runs SQL through a shared warehouse client and turns the rows into a
//! `ResultSet`. No caching, no retries: a failed query fails the request.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{InsightError, Result};
use crate::warehouse::{ResultSet, WarehouseClient};

/// Query executor shared by every request.
pub struct QueryExecutor {
    warehouse: Arc<dyn WarehouseClient>,
    limiter: Option<Semaphore>,
}

impl QueryExecutor {
    /// Creates a new query executor over the given warehouse client.
    pub fn new(warehouse: Arc<dyn WarehouseClient>) -> Self {
        Self {
            warehouse,
            limiter: None,
        }
    }

    /// Caps the number of warehouse queries in flight at once.
    pub fn with_concurrency_limit(mut self, max_concurrent: usize) -> Self {
        self.limiter = Some(Semaphore::new(max_concurrent.max(1)));
        self
    }

    /// Executes `sql` and returns every row as a record.
    ///
    /// Any warehouse-side failure is reported as a query error carrying the
    /// warehouse's message.
    pub async fn execute(&self, sql: &str) -> Result<ResultSet> {
        if sql.is_empty() {
            return Err(InsightError::validation("SQL query must not be empty"));
        }

        let _permit = match &self.limiter {
            Some(limiter) => Some(
                limiter
                    .acquire()
                    .await
                    .map_err(|e| InsightError::internal(format!("Query limiter closed: {e}")))?,
            ),
            None => None,
        };

        let start = Instant::now();
        let result = self.warehouse.execute_query(sql).await;
        let elapsed = start.elapsed();

        match result {
            Ok(query_result) => {
                debug!(
                    sql_len = sql.len(),
                    row_count = query_result.row_count,
                    job_id = query_result.job_id.as_deref().unwrap_or("-"),
                    duration_ms = elapsed.as_millis(),
                    "Query executed successfully"
                );
                Ok(query_result.into_result_set())
            }
            Err(e) => {
                warn!(duration_ms = elapsed.as_millis(), "Error executing query: {}", e);
                Err(match e {
                    InsightError::Query(message) => InsightError::Query(message),
                    other => InsightError::query(other.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::warehouse::{
        ColumnInfo, FailingWarehouseClient, MockWarehouseClient, QueryResult, Value,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps while tracking how many queries overlap.
    #[derive(Default)]
    struct SlowWarehouse {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl WarehouseClient for SlowWarehouse {
        async fn execute_query(&self, _sql: &str) -> Result<QueryResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(QueryResult::new())
        }
    }

    struct ConfigFailingWarehouse;

    #[async_trait]
    impl WarehouseClient for ConfigFailingWarehouse {
        async fn execute_query(&self, _sql: &str) -> Result<QueryResult> {
            Err(InsightError::config("Invalid service-account private key"))
        }
    }

    #[tokio::test]
    async fn test_execute_returns_records() {
        let executor = QueryExecutor::new(Arc::new(MockWarehouseClient::new()));

        let result = executor.execute("SELECT * FROM sales").await.unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(result.columns(), &["region", "quarter", "orders", "revenue"]);
        assert_eq!(result.records()[0]["region"], "EMEA");
    }

    #[tokio::test]
    async fn test_every_record_has_same_columns() {
        let ragged = QueryResult::with_data(
            vec![ColumnInfo::new("id", "INT64"), ColumnInfo::new("name", "STRING")],
            vec![
                vec![Value::Int(1), "a".into()],
                vec![Value::Int(2)],
                vec![Value::Null, Value::Null],
            ],
        );
        let warehouse = MockWarehouseClient::new().with_result("users", ragged);
        let executor = QueryExecutor::new(Arc::new(warehouse));

        let result = executor.execute("SELECT id, name FROM users").await.unwrap();

        let first: Vec<&String> = result.records()[0].keys().collect();
        for record in result.records() {
            assert_eq!(record.keys().collect::<Vec<_>>(), first);
        }
    }

    #[tokio::test]
    async fn test_execute_rejects_empty_sql() {
        let warehouse = Arc::new(MockWarehouseClient::new());
        let executor = QueryExecutor::new(warehouse.clone());

        let err = executor.execute("").await.unwrap_err();

        assert!(err.is_client_error());
        assert_eq!(warehouse.call_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_propagates_query_error() {
        let executor = QueryExecutor::new(Arc::new(FailingWarehouseClient::new(
            "Syntax error: Expected end of input but got identifier",
        )));

        let err = executor.execute("SELEC 1").await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Query error: Syntax error: Expected end of input but got identifier"
        );
    }

    #[tokio::test]
    async fn test_non_query_failures_become_query_errors() {
        let executor = QueryExecutor::new(Arc::new(ConfigFailingWarehouse));

        let err = executor.execute("SELECT 1").await.unwrap_err();

        assert_eq!(err.category(), "Query Error");
        assert!(err.to_string().contains("private key"));
    }

    #[tokio::test]
    async fn test_concurrency_limit() {
        let warehouse = Arc::new(SlowWarehouse::default());
        let executor =
            Arc::new(QueryExecutor::new(warehouse.clone()).with_concurrency_limit(1));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let executor = Arc::clone(&executor);
                tokio::spawn(async move { executor.execute("SELECT 1").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(warehouse.peak.load(Ordering::SeqCst), 1);
    }
}
