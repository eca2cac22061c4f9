//! A single pipeline stage: a persona, a task, and an optional tool.

use std::sync::Arc;

use tracing::debug;

use crate::error::{InsightError, Result};
use crate::llm::parser::fence_sql;
use crate::llm::prompt::{build_messages, build_system_prompt, build_task_prompt};
use crate::llm::{LlmClient, Message, QueryTool, QUERY_TOOL_NAME};
use crate::warehouse::ResultSet;

use super::{StageKind, StageMemory, StageOutput};

/// Placeholder the Query task substitutes the SQL into.
const SQL_PLACEHOLDER: &str = "{sql_query}";

/// What a stage is given to work on.
#[derive(Debug, Clone, Copy)]
pub enum StageInput<'a> {
    /// Tool-bound Query stage: only the SQL.
    Query { sql: &'a str },
    /// First stage after a pre-fetched query: the SQL and its records.
    Dataset {
        sql: &'a str,
        result_set: &'a ResultSet,
    },
    /// A later stage: the SQL and the previous stage's output.
    Prior {
        sql: &'a str,
        output: &'a StageOutput,
    },
}

/// A named unit of work in the pipeline.
pub struct Stage {
    kind: StageKind,
    role: String,
    goal: String,
    backstory: String,
    description: String,
    expected_output: String,
    tool: Option<QueryTool>,
    require_tool_call: bool,
    max_tool_rounds: usize,
    memory: Option<Arc<StageMemory>>,
}

impl Stage {
    /// Creates a stage with the given persona and task.
    pub fn new(
        kind: StageKind,
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            description: String::new(),
            expected_output: String::new(),
            tool: None,
            require_tool_call: false,
            max_tool_rounds: 4,
            memory: None,
        }
    }

    /// The BigQuery specialist that runs the request's SQL.
    pub fn query() -> Self {
        Self::new(
            StageKind::Query,
            "BigQuery Specialist",
            "Query BigQuery datasets to retrieve relevant data",
            "You are a specialist in querying BigQuery to extract meaningful data for analysis.",
        )
        .with_task(
            "Query the BigQuery dataset with the following SQL query:\n{sql_query}\n\
             Run it exactly as written with the run_bigquery_query tool. \
             Retrieve the results and pass them on for analysis.",
            "The queried rows as JSON records.",
        )
    }

    /// The analyst that turns records into a report.
    pub fn analysis() -> Self {
        Self::new(
            StageKind::Analysis,
            "Data Analysis Specialist",
            "Analyze datasets and provide insightful conclusions",
            "You specialize in analyzing complex datasets and providing meaningful insights \
             through statistical methods.",
        )
        .with_task(
            "Analyze the provided dataset and generate statistical summaries. \
             Identify any significant patterns or correlations.",
            "A detailed report with statistical summaries, highlighting significant patterns \
             and correlations in the data.",
        )
    }

    /// The reviewer that checks the analysis.
    pub fn qa_review() -> Self {
        Self::new(
            StageKind::QaReview,
            "Quality Assurance Specialist",
            "Review the analysis results for accuracy, completeness, and clarity",
            "You are an expert in ensuring the quality of data analysis, checking for \
             accuracy, thoroughness, and actionable insights.",
        )
        .with_task(
            "Review the analysis report prepared by the Data Analysis Specialist. \
             Ensure that the report is accurate, thorough, and provides actionable insights. \
             Check for the following:\n\
             - Accuracy: Verify the correctness of the data and calculations.\n\
             - Completeness: Ensure all relevant aspects of the data are covered.\n\
             - Clarity: Confirm that the report is clear and easy to understand.\n\
             - Actionable Insights: Identify if the report provides clear and practical \
             recommendations.\n\
             Provide feedback and suggest any improvements if necessary.",
            "A QA report confirming the accuracy and completeness of the analysis, along with \
             any suggestions for improvement.",
        )
    }

    /// Sets the task description and expected output.
    pub fn with_task(
        mut self,
        description: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        self.description = description.into();
        self.expected_output = expected_output.into();
        self
    }

    /// Binds the warehouse query tool to this stage.
    pub fn with_tool(mut self, tool: QueryTool) -> Self {
        self.tool = Some(tool);
        self
    }

    /// Requires the stage to call its tool before answering.
    pub fn require_tool_call(mut self) -> Self {
        self.require_tool_call = true;
        self
    }

    /// Caps the tool-call round trips per run.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Gives the stage a memory of earlier runs.
    pub fn with_memory(mut self, memory: Arc<StageMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn has_tool(&self) -> bool {
        self.tool.is_some()
    }

    /// Renders the task message for the given input.
    pub fn render_task(&self, input: StageInput<'_>) -> String {
        match input {
            StageInput::Query { sql } => build_task_prompt(
                &self.description.replace(SQL_PLACEHOLDER, &fence_sql(sql)),
                &self.expected_output,
                &[],
            ),
            StageInput::Dataset { sql, result_set } => build_task_prompt(
                &self.description,
                &self.expected_output,
                &[
                    format!("ORIGINAL SQL QUERY:\n{}", sql),
                    format!(
                        "DATASET ({} records, JSON):\n{}",
                        result_set.len(),
                        result_set.to_json_records()
                    ),
                ],
            ),
            StageInput::Prior { sql, output } => build_task_prompt(
                &self.description,
                &self.expected_output,
                &[
                    format!("ORIGINAL SQL QUERY:\n{}", sql),
                    format!("CONTEXT FROM PREVIOUS STAGE:\n{}", output),
                ],
            ),
        }
    }

    /// The task as remembered for later requests.
    ///
    /// Records and upstream output are left out; only the instruction and
    /// the SQL it was about are replayed.
    fn remembered_task(&self, input: StageInput<'_>) -> String {
        match input {
            StageInput::Query { .. } => self.render_task(input),
            StageInput::Dataset { sql, .. } | StageInput::Prior { sql, .. } => build_task_prompt(
                &self.description,
                &self.expected_output,
                &[format!("ORIGINAL SQL QUERY:\n{}", sql)],
            ),
        }
    }

    /// Runs the stage to completion.
    ///
    /// With a tool bound, the LLM may call it up to `max_tool_rounds` times;
    /// a warehouse failure inside a call is returned as a query error.
    pub async fn run(&self, llm: &dyn LlmClient, input: StageInput<'_>) -> Result<StageOutput> {
        let task = self.render_task(input);
        let system = build_system_prompt(&self.role, &self.goal, &self.backstory, self.has_tool());
        let history = match &self.memory {
            Some(memory) => memory.history().await,
            None => Vec::new(),
        };
        let mut messages = build_messages(&system, &history, &task);

        let text = match &self.tool {
            None => llm.complete(&messages).await?,
            Some(tool) => self.run_with_tool(llm, tool, &mut messages).await?,
        };

        if let Some(memory) = &self.memory {
            memory
                .remember(self.remembered_task(input), text.clone())
                .await;
        }
        Ok(StageOutput::new(text))
    }

    async fn run_with_tool(
        &self,
        llm: &dyn LlmClient,
        tool: &QueryTool,
        messages: &mut Vec<Message>,
    ) -> Result<String> {
        let tools = [QueryTool::definition()];
        let mut called_tool = false;

        for round in 0..=self.max_tool_rounds {
            let response = llm.complete_with_tools(messages, &tools).await?;

            if !response.has_tool_calls() {
                if self.require_tool_call && !called_tool {
                    return Err(InsightError::llm(format!(
                        "Stage finished without calling {}",
                        QUERY_TOOL_NAME
                    )));
                }
                return Ok(response.content);
            }

            if round == self.max_tool_rounds {
                return Err(InsightError::llm(format!(
                    "Tool-call limit of {} rounds exceeded",
                    self.max_tool_rounds
                )));
            }

            messages.push(Message::assistant_tool_calls(
                response.content,
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                debug!(stage = %self.kind, tool = %call.name, round, "Executing tool call");
                let content = if call.name == QUERY_TOOL_NAME {
                    called_tool = true;
                    tool.call(&call.arguments).await?
                } else {
                    serde_json::json!({ "error": format!("Unknown tool: {}", call.name) })
                        .to_string()
                };
                messages.push(Message::tool_result(call.id.clone(), content));
            }
        }

        Err(InsightError::internal("tool loop exited without a response"))
    }
}
