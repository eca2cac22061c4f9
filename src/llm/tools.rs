//! LLM tool definitions for function calling.
//!
//! Exposes the warehouse query as a tool that pipeline stages can call when
//! the pipeline runs in tool-bound mode.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::QueryExecutor;

/// Name under which the warehouse query is offered to the LLM.
pub const QUERY_TOOL_NAME: &str = "run_bigquery_query";

/// Tool definition for LLM function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Input parameters for the query tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryToolInput {
    pub sql_query: String,
}

/// Output of the query tool as seen by the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct QueryToolOutput {
    pub row_count: usize,
    pub columns: Vec<String>,
    pub rows: Vec<crate::warehouse::Record>,
}

/// The warehouse query bound to a stage as a callable tool.
#[derive(Clone)]
pub struct QueryTool {
    executor: Arc<QueryExecutor>,
}

impl QueryTool {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Returns the definition advertised to the LLM.
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: QUERY_TOOL_NAME.to_string(),
            description: "Run a SQL query against BigQuery and return the resulting rows \
                          as JSON records."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "sql_query": {
                        "type": "string",
                        "description": "Standard SQL to execute"
                    }
                },
                "required": ["sql_query"]
            }),
        }
    }

    /// Executes a tool call and returns the JSON content for the LLM.
    ///
    /// Malformed arguments are reported back to the LLM as a JSON error so
    /// it can correct itself; a warehouse failure is returned as `Err` and
    /// fails the request.
    pub async fn call(&self, arguments: &str) -> Result<String> {
        let input: QueryToolInput = match serde_json::from_str(arguments) {
            Ok(input) => input,
            Err(e) => {
                return Ok(serde_json::json!({
                    "error": format!("Invalid arguments: {e}")
                })
                .to_string())
            }
        };
        if input.sql_query.is_empty() {
            return Ok(serde_json::json!({ "error": "sql_query must not be empty" }).to_string());
        }

        let result_set = self.executor.execute(&input.sql_query).await?;
        let output = QueryToolOutput {
            row_count: result_set.len(),
            columns: result_set.columns().to_vec(),
            rows: result_set.records().to_vec(),
        };
        Ok(serde_json::to_string(&output).unwrap_or_else(|_| "{}".to_string()))
    }
}
