//! Request handlers for `/analyze` and `/health`.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::Json;
use tracing::{debug, error};

use crate::error::InsightError;
use crate::pipeline::PipelineResult;

use super::error::ApiError;
use super::AppState;

/// Pulls a non-empty string `sql_query` out of a JSON body.
///
/// Anything else (bad JSON, missing field, wrong type, empty string) is `None`.
pub fn extract_sql_query(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let sql = value.get("sql_query")?.as_str()?;
    if sql.is_empty() {
        None
    } else {
        Some(sql.to_string())
    }
}

/// `POST /analyze`: run the pipeline for the posted SQL.
pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<PipelineResult>, ApiError> {
    let body = body.map_err(|rejection| {
        debug!("Rejected request body: {}", rejection.body_text());
        ApiError::new(rejection.status(), rejection.body_text())
    })?;
    debug!(body_len = body.len(), "Request received");

    let Some(sql) = extract_sql_query(&body) else {
        debug!("Request failed validation: sql_query missing or empty");
        return Err(ApiError::sql_query_required());
    };
    debug!("Received SQL query: {}", sql);

    let timeout = state.request_timeout;
    let result = match tokio::time::timeout(timeout, state.orchestrator.analyze(&sql)).await {
        Ok(result) => result,
        Err(_) => Err(InsightError::Timeout(timeout.as_secs())),
    };

    match result {
        Ok(result) => {
            debug!("Request responded");
            Ok(Json(result))
        }
        Err(e) => {
            error!("Error in analysis pipeline: {}", e);
            Err(e.into())
        }
    }
}

/// `GET /health`: always healthy; checks no dependencies.
pub async fn health() -> Json<serde_json::Value> {
    debug!("Health check endpoint hit");
    Json(serde_json::json!({ "status": "healthy" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sql_query() {
        assert_eq!(
            extract_sql_query(br#"{"sql_query": "SELECT 1"}"#).as_deref(),
            Some("SELECT 1")
        );
        assert_eq!(
            extract_sql_query(br#"{"sql_query": "  ", "extra": true}"#).as_deref(),
            Some("  ")
        );
    }

    #[test]
    fn test_extract_sql_query_rejects_bad_input() {
        assert_eq!(extract_sql_query(b""), None);
        assert_eq!(extract_sql_query(b"not json"), None);
        assert_eq!(extract_sql_query(b"{}"), None);
        assert_eq!(extract_sql_query(br#"{"sql_query": ""}"#), None);
        assert_eq!(extract_sql_query(br#"{"sql_query": 42}"#), None);
        assert_eq!(extract_sql_query(br#"{"sql_query": null}"#), None);
        assert_eq!(extract_sql_query(br#"["SELECT 1"]"#), None);
    }
}
