//! Error types for bq-insight.
//!
//! Defines the main error enum used throughout the service.

use thiserror::Error;

use crate::pipeline::StageKind;

/// Main error type for bq-insight operations.
#[derive(Error, Debug)]
pub enum InsightError {
    /// Malformed or missing request input.
    #[error("{0}")]
    Validation(String),

    /// Warehouse errors (syntax errors, permission denied, job failures, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// A pipeline stage failed; carries the stage that failed.
    #[error("Pipeline stage '{stage}' failed: {message}")]
    Stage { stage: StageKind, message: String },

    /// LLM API errors (rate limits, auth, timeouts, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration errors (invalid config file, missing credentials, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request exceeded its deadline.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InsightError {
    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a stage error for the given stage.
    pub fn stage(stage: StageKind, msg: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            message: msg.into(),
        }
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation Error",
            Self::Query(_) => "Query Error",
            Self::Stage { .. } => "Pipeline Stage Error",
            Self::Llm(_) => "LLM Error",
            Self::Config(_) => "Configuration Error",
            Self::Timeout(_) => "Timeout",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns true for errors caused by the caller rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias using InsightError.
pub type Result<T> = std::result::Result<T, InsightError>;
