//! BigQuery integration tests.
//!
//! These run against a real project and are skipped unless
//! BQ_INSIGHT_TEST_PROJECT is set (credentials come from
//! GOOGLE_APPLICATION_CREDENTIALS or BIGQUERY_ACCESS_TOKEN).

use bq_insight::config::WarehouseConfig;
use bq_insight::query::QueryExecutor;
use bq_insight::warehouse::{BigQueryClient, Value, WarehouseClient};
use std::sync::Arc;

/// Helper to create a test client.
fn get_test_client() -> Option<BigQueryClient> {
    let project = std::env::var("BQ_INSIGHT_TEST_PROJECT").ok()?;
    let config = WarehouseConfig {
        project_id: Some(project),
        credentials_path: std::env::var("GOOGLE_APPLICATION_CREDENTIALS")
            .ok()
            .map(Into::into),
        access_token: std::env::var("BIGQUERY_ACCESS_TOKEN").ok(),
        location: std::env::var("BIGQUERY_LOCATION").ok(),
        ..WarehouseConfig::default()
    };
    BigQueryClient::from_config(&config).ok()
}

#[tokio::test]
async fn test_execute_simple_select() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: BQ_INSIGHT_TEST_PROJECT not set");
        return;
    };

    let result = client
        .execute_query("SELECT 1 AS num, 'hello' AS greeting, NULL AS nothing")
        .await
        .unwrap();

    assert_eq!(result.columns.len(), 3);
    assert_eq!(result.columns[0].name, "num");
    assert_eq!(result.columns[1].name, "greeting");
    assert_eq!(result.row_count, 1);
    assert_eq!(result.rows[0][0], Value::Int(1));
    assert_eq!(result.rows[0][1], Value::from("hello"));
    assert!(result.rows[0][2].is_null());
}

#[tokio::test]
async fn test_executor_returns_records() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: BQ_INSIGHT_TEST_PROJECT not set");
        return;
    };
    let executor = QueryExecutor::new(Arc::new(client));

    let result = executor
        .execute("SELECT n, n * 2 AS doubled FROM UNNEST(GENERATE_ARRAY(1, 3)) AS n ORDER BY n")
        .await
        .unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.records()[2]["doubled"], 6);
}

#[tokio::test]
async fn test_invalid_sql_is_query_error() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: BQ_INSIGHT_TEST_PROJECT not set");
        return;
    };

    let err = client.execute_query("SELEC 1").await.unwrap_err();

    assert_eq!(err.category(), "Query Error");
    assert!(err.to_string().contains("Syntax error"));
}
