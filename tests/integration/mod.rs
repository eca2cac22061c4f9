//! Integration tests for bq-insight.

pub mod api_test;
pub mod bigquery_test;
pub mod pipeline_test;
