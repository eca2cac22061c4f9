//! LLM integration for bq-insight.
//!
//! Provides the capability trait pipeline stages call through, plus the
//! OpenAI and mock implementations.

pub mod factory;
pub mod mock;
pub mod openai;
pub mod parser;
pub mod prompt;
pub mod tools;
pub mod types;

pub use factory::create_client;
pub use mock::{MockLlmClient, RecordedCall};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use tools::{QueryTool, ToolDefinition, QUERY_TOOL_NAME};
pub use types::{LlmResponse, Message, Role, ToolCall};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Result;

/// Trait for LLM clients that can generate completions.
///
/// Implementations must be thread-safe (Send + Sync); one client is shared
/// by every request.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the given messages.
    ///
    /// Returns the text of the response.
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let response = self.complete_with_tools(messages, &[]).await?;
        Ok(response.content)
    }

    /// Generates a completion with tools the LLM may call.
    ///
    /// The response either carries text or tool calls the caller must
    /// execute and answer with tool-result messages.
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse>;
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI chat completions
    #[default]
    OpenAi,
    /// Mock client for testing (no API key required)
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
