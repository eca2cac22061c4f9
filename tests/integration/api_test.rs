//! HTTP boundary tests.
//!
//! Drives the axum router with `oneshot` against mock warehouse and LLM clients.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bq_insight::app::build_state_with;
use bq_insight::config::Config;
use bq_insight::error::Result;
use bq_insight::llm::{LlmClient, LlmResponse, Message, MockLlmClient, ToolDefinition};
use bq_insight::pipeline::PipelineMode;
use bq_insight::server::create_app;
use bq_insight::warehouse::{FailingWarehouseClient, MockWarehouseClient, WarehouseClient};
use pretty_assertions::assert_eq;
use tower::ServiceExt;

fn config(mode: PipelineMode, memory: bool) -> Config {
    let mut config = Config::default();
    config.pipeline.mode = mode;
    config.pipeline.memory = memory;
    config
}

fn app_with(
    config: &Config,
    warehouse: Arc<dyn WarehouseClient>,
    llm: Arc<dyn LlmClient>,
) -> Router {
    create_app(build_state_with(config, warehouse, llm))
}

fn mock_app() -> Router {
    app_with(
        &config(PipelineMode::Prefetched, false),
        Arc::new(MockWarehouseClient::new()),
        Arc::new(MockLlmClient::new()),
    )
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn post_analyze(app: Router, body: impl Into<Body>) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    send(app, request).await
}

fn sql_query_required() -> serde_json::Value {
    serde_json::json!({"error": "sql_query is required"})
}

/// Never answers within the request deadline.
struct SlowLlm;

#[async_trait]
impl LlmClient for SlowLlm {
    async fn complete_with_tools(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(LlmResponse::text("too late"))
    }
}

#[tokio::test]
async fn test_health_is_always_healthy() {
    // Neither dependency works; health must not care
    let app = app_with(
        &config(PipelineMode::Prefetched, false),
        Arc::new(FailingWarehouseClient::new("unreachable")),
        Arc::new(MockLlmClient::new().with_failure("", "unreachable")),
    );
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, json) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({"status": "healthy"}));
}

#[tokio::test]
async fn test_analyze_success_has_both_keys() {
    let (status, json) = post_analyze(mock_app(), r#"{"sql_query": "SELECT * FROM sales"}"#).await;

    assert_eq!(status, StatusCode::OK);
    let object = json.as_object().unwrap();
    assert_eq!(
        object.keys().collect::<Vec<_>>(),
        vec!["analysis_result", "qa_report"]
    );
    assert!(json["analysis_result"]
        .as_str()
        .unwrap()
        .starts_with("Analysis report:"));
    assert!(json["qa_report"].as_str().unwrap().starts_with("QA report:"));
}

#[tokio::test]
async fn test_missing_or_empty_sql_query_is_bad_request() {
    let bodies = [
        "{}",
        r#"{"sql_query": ""}"#,
        r#"{"sql_query": 42}"#,
        r#"{"sql_query": null}"#,
        r#"{"query": "SELECT 1"}"#,
        "not json",
        "",
    ];

    for body in bodies {
        let warehouse = Arc::new(MockWarehouseClient::new());
        let llm = Arc::new(MockLlmClient::new());
        let app = app_with(
            &config(PipelineMode::Prefetched, false),
            warehouse.clone(),
            llm.clone(),
        );

        let (status, json) = post_analyze(app, body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body:?}");
        assert_eq!(json, sql_query_required(), "body: {body:?}");
        assert_eq!(warehouse.call_count(), 0);
        assert_eq!(llm.call_count(), 0);
    }
}

#[tokio::test]
async fn test_query_failure_is_internal_error() {
    let llm = Arc::new(MockLlmClient::new());
    let app = app_with(
        &config(PipelineMode::Prefetched, false),
        Arc::new(FailingWarehouseClient::new(
            "Syntax error: Unexpected keyword FORM at [1:10]",
        )),
        llm.clone(),
    );

    let (status, json) = post_analyze(app, r#"{"sql_query": "SELECT * FORM t"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json,
        serde_json::json!({"error": "Query error: Syntax error: Unexpected keyword FORM at [1:10]"})
    );
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_analysis_failure_never_runs_qa() {
    let llm = Arc::new(
        MockLlmClient::new().with_failure("You are a Data Analysis Specialist", "Rate limited"),
    );
    let app = app_with(
        &config(PipelineMode::Prefetched, false),
        Arc::new(MockWarehouseClient::new()),
        llm.clone(),
    );

    let (status, json) = post_analyze(app, r#"{"sql_query": "SELECT 1"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json["error"],
        "Pipeline stage 'analysis' failed: LLM error: Rate limited"
    );
    let calls = llm.calls();
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].system.contains("Quality Assurance Specialist"));
}

#[tokio::test]
async fn test_qa_runs_after_analysis() {
    let llm = Arc::new(MockLlmClient::new());
    let app = app_with(
        &config(PipelineMode::Prefetched, false),
        Arc::new(MockWarehouseClient::new()),
        llm.clone(),
    );

    let (status, json) = post_analyze(app, r#"{"sql_query": "SELECT 1"}"#).await;

    assert_eq!(status, StatusCode::OK);
    let calls = llm.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].system.contains("Data Analysis Specialist"));
    assert!(calls[1].system.contains("Quality Assurance Specialist"));
    assert!(calls[1]
        .user
        .contains(json["analysis_result"].as_str().unwrap()));
}

#[tokio::test]
async fn test_repeat_without_memory_has_same_shape() {
    let app = mock_app();

    let (first_status, first) =
        post_analyze(app.clone(), r#"{"sql_query": "SELECT * FROM sales"}"#).await;
    let (second_status, second) =
        post_analyze(app, r#"{"sql_query": "SELECT * FROM sales"}"#).await;

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_tool_bound_mode_returns_same_shape() {
    let warehouse = Arc::new(MockWarehouseClient::new());
    let app = app_with(
        &config(PipelineMode::ToolBound, true),
        warehouse.clone(),
        Arc::new(MockLlmClient::new()),
    );

    let (status, json) = post_analyze(app, r#"{"sql_query": "SELECT * FROM sales"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["analysis_result"].is_string());
    assert!(json["qa_report"].is_string());
    assert_eq!(warehouse.call_count(), 1);
}

#[tokio::test]
async fn test_request_deadline() {
    let mut config = config(PipelineMode::Prefetched, false);
    config.server.request_timeout_secs = 1;
    let app = app_with(
        &config,
        Arc::new(MockWarehouseClient::new()),
        Arc::new(SlowLlm),
    );

    let (status, json) = post_analyze(app, r#"{"sql_query": "SELECT 1"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json,
        serde_json::json!({"error": "Request timed out after 1 seconds"})
    );
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = config(PipelineMode::Prefetched, false);
    config.server.max_body_bytes = 64;
    let app = app_with(
        &config,
        Arc::new(MockWarehouseClient::new()),
        Arc::new(MockLlmClient::new()),
    );
    let body = format!(r#"{{"sql_query": "SELECT '{}'"}}"#, "x".repeat(256));

    let (status, json) = post_analyze(app, body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_analyze_requires_post() {
    let request = Request::builder()
        .uri("/analyze")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(mock_app(), request).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
