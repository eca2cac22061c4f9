//! Query execution for bq-insight.
//!
//! This module isolates warehouse execution and result shaping from the
//! pipeline and the HTTP layer.

pub mod executor;

pub use executor::QueryExecutor;
