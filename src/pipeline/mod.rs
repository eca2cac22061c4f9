//! The insight pipeline: query, analysis, and QA review stages.
//!
//! A stage is a persona prompt sent through the shared `LlmClient`; the
//! orchestrator runs the stages strictly in order and hands each stage's
//! output to the next.

mod memory;
mod orchestrator;
mod stage;

pub use memory::StageMemory;
pub use orchestrator::PipelineOrchestrator;
pub use stage::{Stage, StageInput};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the warehouse query is wired into the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// The executor runs the SQL, then Analysis and QA see the records.
    #[default]
    Prefetched,
    /// A Query stage runs the SQL through the `run_bigquery_query` tool.
    ToolBound,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefetched => "prefetched",
            Self::ToolBound => "tool_bound",
        }
    }
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "prefetched" => Ok(Self::Prefetched),
            "tool_bound" => Ok(Self::ToolBound),
            _ => Err(format!(
                "Unknown pipeline mode: {} (expected prefetched or tool_bound)",
                s
            )),
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Query,
    Analysis,
    QaReview,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Analysis => "analysis",
            Self::QaReview => "qa_review",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque text produced by a stage. Serializes as a JSON string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageOutput(String);

impl StageOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The combined pipeline output returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub analysis_result: StageOutput,
    pub qa_report: StageOutput,
}
