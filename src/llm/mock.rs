//! Mock LLM client for testing.
//!
//! Provides deterministic responses based on the stage persona, and records
//! every call for ordering assertions.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::{InsightError, Result};
use crate::llm::parser::extract_sql_block;
use crate::llm::tools::{ToolDefinition, QUERY_TOOL_NAME};
use crate::llm::types::{LlmResponse, Message, Role, ToolCall};
use crate::llm::LlmClient;

/// A call the mock received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// The system prompt of the call.
    pub system: String,
    /// The last user message of the call.
    pub user: String,
    /// Number of messages sent.
    pub message_count: usize,
    /// Number of tools offered.
    pub tool_count: usize,
}

/// Mock LLM client that returns canned responses per stage persona.
///
/// Used for unit testing and local runs without making real API calls.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    /// Injected failures (pattern -> error message).
    failures: Vec<(String, String)>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every call whose messages contain `pattern`.
    pub fn with_failure(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.push((pattern.into(), message.into()));
        self
    }

    /// Returns a snapshot of the calls received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    fn record(&self, messages: &[Message], tools: &[ToolDefinition]) {
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                system,
                user,
                message_count: messages.len(),
                tool_count: tools.len(),
            });
        }
    }

    /// Generates a mock response for the given exchange.
    fn mock_response(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse> {
        let combined = messages
            .iter()
            .map(|m| m.content.to_lowercase())
            .collect::<Vec<_>>()
            .join("\n");

        for (pattern, message) in &self.failures {
            if combined.contains(&pattern.to_lowercase()) {
                return Err(InsightError::llm(message.clone()));
            }
        }

        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let tool_result = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Tool)
            .map(|m| m.content.as_str());

        // First round of a tool-bound stage with a fenced query: call the tool
        if tool_result.is_none() && tools.iter().any(|t| t.name == QUERY_TOOL_NAME) {
            let task = messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.as_str())
                .unwrap_or_default();
            if let Some(sql) = extract_sql_block(task) {
                let arguments = serde_json::json!({ "sql_query": sql }).to_string();
                return Ok(LlmResponse::with_tool_calls(
                    "",
                    vec![ToolCall {
                        id: "call_mock_1".to_string(),
                        name: QUERY_TOOL_NAME.to_string(),
                        arguments,
                    }],
                ));
            }
        }

        Ok(LlmResponse::text(Self::default_reply(system, tool_result)))
    }

    fn default_reply(system: &str, tool_result: Option<&str>) -> String {
        if system.contains("BigQuery Specialist") {
            let rows = tool_result
                .and_then(|content| serde_json::from_str::<serde_json::Value>(content).ok())
                .and_then(|value| value.get("rows").cloned())
                .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
            return format!("Query results:\n{}", rows);
        }

        if system.contains("Data Analysis Specialist") {
            return "Analysis report: revenue is concentrated in EMEA, which leads APAC in both \
                    quarters. Orders and revenue are strongly correlated. One row has a missing \
                    order count."
                .to_string();
        }

        if system.contains("Quality Assurance Specialist") {
            return "QA report: the analysis is accurate and complete. Clarity is good. \
                    Suggest quantifying the quarter-over-quarter change as an actionable insight."
                .to_string();
        }

        "This is a mock response.".to_string()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        self.record(messages, tools);
        self.mock_response(messages, tools)
    }
}
