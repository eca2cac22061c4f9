//! Warehouse abstraction layer for bq-insight.
//!
//! Provides a trait-based interface for running SQL against a managed
//! warehouse, allowing the BigQuery client to be swapped for a mock.

mod auth;
mod bigquery;
mod mock;
mod types;

pub use auth::{BigQueryAuth, ServiceAccountKey, ServiceAccountTokenSource};
pub use bigquery::BigQueryClient;
pub use mock::{FailingWarehouseClient, MockWarehouseClient};
pub use types::{ColumnInfo, QueryResult, Record, ResultSet, Row, Value};

use std::sync::Arc;

use crate::config::WarehouseConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Supported warehouse backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseBackend {
    #[default]
    BigQuery,
    /// In-memory canned results, for local runs and tests.
    Mock,
}

impl WarehouseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigQuery => "bigquery",
            Self::Mock => "mock",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bigquery" | "bq" => Some(Self::BigQuery),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }
}

/// Creates a warehouse client for the configured backend.
///
/// This is the central factory function for warehouse connections.
pub fn connect(config: &WarehouseConfig) -> Result<Arc<dyn WarehouseClient>> {
    match config.backend {
        WarehouseBackend::BigQuery => Ok(Arc::new(BigQueryClient::from_config(config)?)),
        WarehouseBackend::Mock => Ok(Arc::new(MockWarehouseClient::new())),
    }
}

/// Trait defining the interface for warehouse clients.
///
/// Implementations are shared across concurrent requests.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Executes a SQL query, waits for it to finish, and returns every row.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;
}
