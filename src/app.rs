//! Service wiring.
//!
//! Builds the shared clients and the pipeline from a validated `Config`.

use std::sync::Arc;

use axum::Router;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::llm::{self, LlmClient};
use crate::pipeline::PipelineOrchestrator;
use crate::query::QueryExecutor;
use crate::server::{self, AppState};
use crate::warehouse::{self, WarehouseClient};

/// Builds the shared state from config, connecting the configured backends.
pub fn build_state(config: &Config) -> Result<AppState> {
    let warehouse = warehouse::connect(&config.warehouse)?;
    let llm = llm::create_client(&config.llm)?;
    Ok(build_state_with(config, warehouse, llm))
}

/// Builds the shared state around already-constructed clients.
pub fn build_state_with(
    config: &Config,
    warehouse: Arc<dyn WarehouseClient>,
    llm: Arc<dyn LlmClient>,
) -> AppState {
    let mut executor = QueryExecutor::new(warehouse);
    if let Some(limit) = config.warehouse.max_concurrent_queries {
        executor = executor.with_concurrency_limit(limit);
    }

    let orchestrator = PipelineOrchestrator::new(Arc::new(executor), llm, &config.pipeline);
    info!(
        mode = %orchestrator.mode(),
        warehouse = config.warehouse.backend.as_str(),
        llm = %config.llm.provider,
        memory = config.pipeline.memory,
        "Pipeline ready"
    );

    AppState::new(Arc::new(orchestrator), &config.server)
}

/// Builds the router for a validated config.
pub fn build_app(config: &Config) -> Result<Router> {
    Ok(server::create_app(build_state(config)?))
}
