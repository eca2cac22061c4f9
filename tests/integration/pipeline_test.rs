//! End-to-end pipeline tests over HTTP-level fakes.
//!
//! BigQuery and OpenAI are both served by one wiremock server, so the real
//! clients, the pipeline, and the router run together.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bq_insight::app::build_app;
use bq_insight::config::Config;
use bq_insight::llm::LlmProvider;
use bq_insight::warehouse::WarehouseBackend;
use pretty_assertions::assert_eq;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.warehouse.backend = WarehouseBackend::BigQuery;
    config.warehouse.project_id = Some("analytics-prod".to_string());
    config.warehouse.access_token = Some("ya29.test".to_string());
    config.warehouse.api_base_url = Some(server.uri());
    config.llm.provider = LlmProvider::OpenAi;
    config.llm.api_key = Some("sk-test".to_string());
    config.llm.api_base_url = Some(format!("{}/v1", server.uri()));
    config.pipeline.memory = false;
    config
}

fn chat_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

async fn mount_sales_query(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/projects/analytics-prod/queries"))
        .and(header("authorization", "Bearer ya29.test"))
        .and(body_partial_json(json!({"query": "SELECT region, revenue FROM sales"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": {"projectId": "analytics-prod", "jobId": "job_1", "location": "US"},
            "jobComplete": true,
            "schema": {"fields": [
                {"name": "region", "type": "STRING", "mode": "NULLABLE"},
                {"name": "revenue", "type": "FLOAT", "mode": "NULLABLE"}
            ]},
            "rows": [
                {"f": [{"v": "EMEA"}, {"v": "48250"}]},
                {"f": [{"v": "APAC"}, {"v": "30120"}]}
            ]
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn post_analyze(
    app: axum::Router,
    sql: &str,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "sql_query": sql }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_prefetched_pipeline_end_to_end() {
    let server = MockServer::start().await;
    mount_sales_query(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("You are a Data Analysis Specialist"))
        .and(body_string_contains("APAC"))
        .respond_with(chat_reply("EMEA revenue is 60% higher than APAC."))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("You are a Quality Assurance Specialist"))
        .and(body_string_contains("EMEA revenue is 60% higher than APAC."))
        .respond_with(chat_reply("The analysis is accurate."))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app(&config_for(&server)).unwrap();
    let (status, json) = post_analyze(app, "SELECT region, revenue FROM sales").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({
            "analysis_result": "EMEA revenue is 60% higher than APAC.",
            "qa_report": "The analysis is accurate."
        })
    );
}

#[tokio::test]
async fn test_warehouse_error_reaches_caller() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/projects/analytics-prod/queries"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "Access Denied: Project analytics-prod: User does not have bigquery.jobs.create permission"
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_reply("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let app = build_app(&config_for(&server)).unwrap();
    let (status, json) = post_analyze(app, "SELECT 1").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json["error"],
        "Query error: Access Denied: Project analytics-prod: User does not have bigquery.jobs.create permission"
    );
}

#[tokio::test]
async fn test_llm_auth_failure_names_analysis_stage() {
    let server = MockServer::start().await;
    mount_sales_query(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app(&config_for(&server)).unwrap();
    let (status, json) = post_analyze(app, "SELECT region, revenue FROM sales").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json["error"],
        "Pipeline stage 'analysis' failed: LLM error: Authentication failed. Check your OPENAI_API_KEY."
    );
}
