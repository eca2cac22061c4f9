//! Mock warehouse clients for testing.
//!
//! Provides an in-memory warehouse for local runs and a client that always
//! fails for exercising error paths.

use super::{ColumnInfo, QueryResult, Value, WarehouseClient};
use crate::error::{InsightError, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// A mock warehouse client that returns predefined results.
#[derive(Debug, Default)]
pub struct MockWarehouseClient {
    /// Custom result mappings (SQL substring -> result).
    custom_results: Vec<(String, QueryResult)>,
    queries: Mutex<Vec<String>>,
}

impl MockWarehouseClient {
    /// Creates a new mock client with the default sales dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `result` for any SQL containing `pattern` (case-insensitive).
    pub fn with_result(mut self, pattern: impl Into<String>, result: QueryResult) -> Self {
        self.custom_results.push((pattern.into(), result));
        self
    }

    /// Number of queries executed so far.
    pub fn call_count(&self) -> usize {
        self.queries.lock().map(|queries| queries.len()).unwrap_or(0)
    }

    /// The SQL of every query executed so far, as received.
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }

    fn sales_dataset() -> QueryResult {
        let columns = vec![
            ColumnInfo::new("region", "STRING"),
            ColumnInfo::new("quarter", "STRING"),
            ColumnInfo::new("orders", "INT64"),
            ColumnInfo::new("revenue", "FLOAT64"),
        ];
        let rows = vec![
            vec!["EMEA".into(), "Q1".into(), Value::Int(120), Value::Float(48_250.0)],
            vec!["EMEA".into(), "Q2".into(), Value::Int(134), Value::Float(51_900.5)],
            vec!["APAC".into(), "Q1".into(), Value::Int(88), Value::Float(30_120.0)],
            vec!["APAC".into(), "Q2".into(), Value::Null, Value::Float(29_800.25)],
        ];
        QueryResult::with_data(columns, rows)
    }
}

#[async_trait]
impl WarehouseClient for MockWarehouseClient {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(sql.to_string());
        }
        let sql_lower = sql.to_lowercase();

        for (pattern, result) in &self.custom_results {
            if sql_lower.contains(&pattern.to_lowercase()) {
                return Ok(result.clone());
            }
        }

        let trimmed = sql_lower.trim_start();
        if trimmed.starts_with("select") || trimmed.starts_with("with") {
            Ok(Self::sales_dataset())
        } else {
            // Statements without a result set
            Ok(QueryResult::new())
        }
    }
}

/// A warehouse client whose every query fails with the given message.
#[derive(Debug, Clone)]
pub struct FailingWarehouseClient {
    message: String,
}

impl FailingWarehouseClient {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl WarehouseClient for FailingWarehouseClient {
    async fn execute_query(&self, _sql: &str) -> Result<QueryResult> {
        Err(InsightError::query(self.message.clone()))
    }
}
