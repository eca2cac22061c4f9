//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::Result;
use crate::llm::{LlmClient, LlmProvider, MockLlmClient, OpenAiClient, OpenAiConfig};

/// Creates an LLM client for the configured provider.
///
/// The API key and model come from the `[llm]` section, which has already
/// been filled from `OPENAI_API_KEY` / `OPENAI_MODEL_NAME` when unset.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider {
        LlmProvider::OpenAi => {
            let client = OpenAiClient::new(OpenAiConfig::from_llm_config(config)?)?;
            tracing::debug!(model = client.model(), "Using OpenAI LLM client");
            Ok(Arc::new(client))
        }
        LlmProvider::Mock => Ok(Arc::new(MockLlmClient::new())),
    }
}
