//! Pipeline orchestration.
//!
//! Composes the stages for the configured mode and runs them strictly in
//! order. A failing stage aborts the pipeline; there are no partial results.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{InsightError, Result};
use crate::llm::{LlmClient, QueryTool};
use crate::query::QueryExecutor;
use crate::warehouse::ResultSet;

use super::{PipelineMode, PipelineResult, Stage, StageInput, StageMemory, StageOutput};

/// Runs the query → analysis → QA pipeline.
pub struct PipelineOrchestrator {
    executor: Arc<QueryExecutor>,
    llm: Arc<dyn LlmClient>,
    mode: PipelineMode,
    query: Stage,
    analysis: Stage,
    qa: Stage,
}

impl PipelineOrchestrator {
    /// Builds the stages for `config.mode`.
    ///
    /// In tool-bound mode every stage gets the query tool and the Query
    /// stage must call it.
    pub fn new(
        executor: Arc<QueryExecutor>,
        llm: Arc<dyn LlmClient>,
        config: &PipelineConfig,
    ) -> Self {
        let mut query = Stage::query();
        let mut analysis = Stage::analysis();
        let mut qa = Stage::qa_review();

        if config.mode == PipelineMode::ToolBound {
            let tool = QueryTool::new(Arc::clone(&executor));
            query = query
                .with_tool(tool.clone())
                .require_tool_call()
                .with_max_tool_rounds(config.max_tool_rounds);
            analysis = analysis
                .with_tool(tool.clone())
                .with_max_tool_rounds(config.max_tool_rounds);
            qa = qa
                .with_tool(tool)
                .with_max_tool_rounds(config.max_tool_rounds);
        }

        if config.memory {
            let memory = || {
                Arc::new(
                    StageMemory::with_max_exchanges(config.memory_max_exchanges)
                        .with_max_chars(config.memory_max_chars),
                )
            };
            query = query.with_memory(memory());
            analysis = analysis.with_memory(memory());
            qa = qa.with_memory(memory());
        }

        Self {
            executor,
            llm,
            mode: config.mode,
            query,
            analysis,
            qa,
        }
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    /// Runs the whole pipeline for `sql` in the configured mode.
    pub async fn analyze(&self, sql: &str) -> Result<PipelineResult> {
        let start = Instant::now();
        let result = match self.mode {
            PipelineMode::Prefetched => {
                let result_set = self.executor.execute(sql).await?;
                debug!(row_count = result_set.len(), "Query executed");
                self.run(&result_set, sql).await
            }
            PipelineMode::ToolBound => self.run_tool_bound(sql).await,
        };

        match &result {
            Ok(_) => info!(
                mode = %self.mode,
                duration_ms = start.elapsed().as_millis(),
                "Pipeline completed"
            ),
            Err(e) => warn!(mode = %self.mode, "Pipeline failed: {}", e),
        }
        result
    }

    /// Runs Analysis over `result_set`, then QA over the analysis.
    pub async fn run(&self, result_set: &ResultSet, sql: &str) -> Result<PipelineResult> {
        let analysis_result = self
            .run_stage(&self.analysis, StageInput::Dataset { sql, result_set })
            .await?;
        let qa_report = self
            .run_stage(
                &self.qa,
                StageInput::Prior {
                    sql,
                    output: &analysis_result,
                },
            )
            .await?;

        Ok(PipelineResult {
            analysis_result,
            qa_report,
        })
    }

    async fn run_tool_bound(&self, sql: &str) -> Result<PipelineResult> {
        let query_output = self.run_stage(&self.query, StageInput::Query { sql }).await?;
        let analysis_result = self
            .run_stage(
                &self.analysis,
                StageInput::Prior {
                    sql,
                    output: &query_output,
                },
            )
            .await?;
        let qa_report = self
            .run_stage(
                &self.qa,
                StageInput::Prior {
                    sql,
                    output: &analysis_result,
                },
            )
            .await?;

        Ok(PipelineResult {
            analysis_result,
            qa_report,
        })
    }

    /// Runs one stage, naming it in any failure other than a query error.
    async fn run_stage(&self, stage: &Stage, input: StageInput<'_>) -> Result<StageOutput> {
        let start = Instant::now();
        debug!(stage = %stage.kind(), role = stage.role(), "Stage started");

        match stage.run(self.llm.as_ref(), input).await {
            Ok(output) => {
                debug!(
                    stage = %stage.kind(),
                    output_len = output.as_str().len(),
                    duration_ms = start.elapsed().as_millis(),
                    "Stage completed"
                );
                Ok(output)
            }
            Err(e @ (InsightError::Query(_) | InsightError::Stage { .. })) => Err(e),
            Err(e) => Err(InsightError::stage(stage.kind(), e.to_string())),
        }
    }
}
