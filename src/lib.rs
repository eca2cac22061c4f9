//! bq-insight - forwards SQL to BigQuery and runs the result through an
//! LLM analysis and QA-review pipeline.
//!
//! This library exposes the core modules for the binary and integration tests.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod query;
pub mod server;
pub mod warehouse;
