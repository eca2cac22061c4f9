//! BigQuery warehouse client.
//!
//! Talks to the BigQuery REST API v2: `jobs.query` submits the SQL, then
//! `jobs.getQueryResults` is polled until the job completes and followed
//! through every result page.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::WarehouseConfig;
use crate::error::{InsightError, Result};
use crate::warehouse::auth::{BigQueryAuth, ServiceAccountKey, ServiceAccountTokenSource};
use crate::warehouse::{ColumnInfo, QueryResult, Row, Value, WarehouseClient};

/// BigQuery REST API base URL.
const BIGQUERY_API_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Server-side wait per `jobs.query` / `getQueryResults` call (milliseconds).
const POLL_TIMEOUT_MS: u64 = 10_000;

/// BigQuery warehouse client.
#[derive(Debug, Clone)]
pub struct BigQueryClient {
    http: Client,
    base_url: String,
    project_id: String,
    location: Option<String>,
    auth: BigQueryAuth,
    query_timeout: Duration,
}

impl BigQueryClient {
    /// Builds a client from warehouse configuration.
    ///
    /// A service-account key file takes precedence over a static token. The
    /// project falls back to the key file's `project_id`.
    pub fn from_config(config: &WarehouseConfig) -> Result<Self> {
        let (auth, key_project) = match (&config.credentials_path, &config.access_token) {
            (Some(path), _) => {
                let key = ServiceAccountKey::from_file(path)?;
                let project = key.project_id.clone();
                (
                    BigQueryAuth::ServiceAccount(ServiceAccountTokenSource::new(key)?),
                    project,
                )
            }
            (None, Some(token)) => (BigQueryAuth::StaticToken(token.clone()), None),
            (None, None) => {
                return Err(InsightError::config(
                    "No BigQuery credentials configured",
                ))
            }
        };

        let project_id = config
            .project_id
            .clone()
            .or(key_project)
            .ok_or_else(|| InsightError::config("No BigQuery project configured"))?;

        let base_url = config
            .api_base_url
            .as_deref()
            .unwrap_or(BIGQUERY_API_URL)
            .trim_end_matches('/')
            .to_string();
        Url::parse(&base_url)
            .map_err(|e| InsightError::config(format!("Invalid BigQuery API URL: {e}")))?;

        let query_timeout = Duration::from_secs(config.query_timeout_secs);
        let http = Client::builder()
            .timeout(query_timeout)
            .build()
            .map_err(|e| InsightError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            project_id,
            location: config.location.clone(),
            auth,
            query_timeout,
        })
    }

    /// Returns the project queries are billed to.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn run_query(&self, sql: &str) -> Result<QueryResult> {
        let token = self.auth.bearer_token(&self.http).await?;

        let request = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            timeout_ms: POLL_TIMEOUT_MS,
            location: self.location.as_deref(),
            format_options: FormatOptions {
                use_int64_timestamp: true,
            },
        };
        let url = format!("{}/projects/{}/queries", self.base_url, self.project_id);
        let mut response = self
            .send(self.http.post(&url).bearer_auth(&token).json(&request))
            .await?;

        let job = response
            .job_reference
            .clone()
            .ok_or_else(|| InsightError::query("BigQuery response is missing a job reference"))?;

        while !response.job_complete {
            debug!(job_id = %job.job_id, "Waiting for BigQuery job to complete");
            response = self.get_query_results(&token, &job, None).await?;
        }

        let fields = response.schema.take().map(|s| s.fields).unwrap_or_default();
        let columns: Vec<ColumnInfo> = fields
            .iter()
            .map(|f| ColumnInfo::new(&f.name, f.display_type()))
            .collect();

        let mut rows: Vec<Row> = convert_rows(&fields, response.rows);
        let mut page_token = response.page_token;
        while let Some(token_value) = page_token {
            debug!(job_id = %job.job_id, rows = rows.len(), "Fetching next result page");
            let page = self
                .get_query_results(&token, &job, Some(&token_value))
                .await?;
            rows.extend(convert_rows(&fields, page.rows));
            page_token = page.page_token;
        }

        let mut result = QueryResult::with_data(columns, rows);
        result.job_id = Some(job.job_id);
        Ok(result)
    }

    async fn get_query_results(
        &self,
        token: &str,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.base_url, job.project_id, job.job_id
        );

        let mut params: Vec<(&str, String)> = vec![
            ("timeoutMs", POLL_TIMEOUT_MS.to_string()),
            ("formatOptions.useInt64Timestamp", "true".to_string()),
        ];
        if let Some(location) = job.location.as_deref().or(self.location.as_deref()) {
            params.push(("location", location.to_string()));
        }
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token.to_string()));
        }

        self.send(self.http.get(&url).bearer_auth(token).query(&params))
            .await
    }

    async fn send(&self, request: RequestBuilder) -> Result<QueryResponse> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InsightError::query("BigQuery request timed out")
            } else if e.is_connect() {
                InsightError::query("Failed to connect to BigQuery. Check your network.")
            } else {
                InsightError::query(format!("BigQuery request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InsightError::query(format!("Failed to read BigQuery response: {e}")))?;

        if !status.is_success() {
            return Err(parse_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| InsightError::query(format!("Failed to parse BigQuery response: {e}")))
    }
}

#[async_trait]
impl WarehouseClient for BigQueryClient {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        tokio::time::timeout(self.query_timeout, self.run_query(sql))
            .await
            .map_err(|_| {
                warn!(
                    timeout_secs = self.query_timeout.as_secs(),
                    "BigQuery query timed out"
                );
                InsightError::query(format!(
                    "Query timed out after {} seconds",
                    self.query_timeout.as_secs()
                ))
            })?
    }
}

/// Maps a non-success API response to a query error.
fn parse_error(status: reqwest::StatusCode, body: &str) -> InsightError {
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return InsightError::query("BigQuery authentication failed. Check your credentials.");
    }

    if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(body) {
        return InsightError::query(error_response.error.message);
    }

    InsightError::query(format!("BigQuery API error ({status}): {body}"))
}

fn convert_rows(fields: &[FieldSchema], rows: Vec<TableRow>) -> Vec<Row> {
    rows.into_iter()
        .map(|row| {
            fields
                .iter()
                .zip(row.f.into_iter().chain(std::iter::repeat_with(TableCell::default)))
                .map(|(field, cell)| convert_cell(field, cell.v))
                .collect()
        })
        .collect()
}

/// Converts one cell to a typed value according to its schema field.
fn convert_cell(field: &FieldSchema, raw: serde_json::Value) -> Value {
    if raw.is_null() {
        return Value::Null;
    }
    if field.is_repeated() || field.is_record() {
        return Value::Json(cell_to_json(field, raw));
    }

    let text = match raw {
        serde_json::Value::String(s) => s,
        other => return Value::Json(other),
    };

    match field.field_type.as_str() {
        "INTEGER" | "INT64" => text.parse().map(Value::Int).unwrap_or(Value::String(text)),
        "FLOAT" | "FLOAT64" => text.parse().map(Value::Float).unwrap_or(Value::String(text)),
        // Exact decimals would lose digits as f64
        "NUMERIC" | "BIGNUMERIC" => Value::String(text),
        "BOOLEAN" | "BOOL" => match text.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text),
        },
        "TIMESTAMP" => Value::String(format_timestamp(&text).unwrap_or(text)),
        _ => Value::String(text),
    }
}

/// JSON form of a nested (repeated or record) cell.
fn cell_to_json(field: &FieldSchema, raw: serde_json::Value) -> serde_json::Value {
    if field.is_repeated() {
        let element = field.element();
        let items = match raw {
            serde_json::Value::Array(items) => items,
            _ => return serde_json::Value::Null,
        };
        return serde_json::Value::Array(
            items
                .into_iter()
                .map(|item| {
                    let inner = item.get("v").cloned().unwrap_or(serde_json::Value::Null);
                    convert_cell(&element, inner).into_json()
                })
                .collect(),
        );
    }

    let cells = raw
        .get("f")
        .and_then(|f| f.as_array())
        .cloned()
        .unwrap_or_default();
    let object: serde_json::Map<String, serde_json::Value> = field
        .fields
        .iter()
        .zip(cells.into_iter().chain(std::iter::repeat(serde_json::Value::Null)))
        .map(|(sub, cell)| {
            let inner = cell.get("v").cloned().unwrap_or(serde_json::Value::Null);
            (sub.name.clone(), convert_cell(sub, inner).into_json())
        })
        .collect();
    serde_json::Value::Object(object)
}

/// Renders an int64 microseconds-since-epoch timestamp as RFC 3339.
fn format_timestamp(micros: &str) -> Option<String> {
    let micros: i64 = micros.parse().ok()?;
    chrono::DateTime::from_timestamp_micros(micros).map(|ts| ts.to_rfc3339())
}

// BigQuery API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    format_options: FormatOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormatOptions {
    use_int64_timestamp: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    job_reference: Option<JobReference>,
    #[serde(default)]
    job_complete: bool,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

impl FieldSchema {
    fn is_repeated(&self) -> bool {
        self.mode.as_deref() == Some("REPEATED")
    }

    fn is_record(&self) -> bool {
        matches!(self.field_type.as_str(), "RECORD" | "STRUCT")
    }

    /// The schema of a single element of a repeated field.
    fn element(&self) -> FieldSchema {
        FieldSchema {
            mode: Some("NULLABLE".to_string()),
            ..self.clone()
        }
    }

    fn display_type(&self) -> String {
        if self.is_repeated() {
            format!("ARRAY<{}>", self.field_type)
        } else {
            self.field_type.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Default, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}
