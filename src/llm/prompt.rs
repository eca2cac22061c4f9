//! Prompt construction for LLM requests.
//!
//! Builds the persona system prompt and task message for a pipeline stage.

use crate::llm::types::Message;

/// System prompt template for a pipeline stage.
const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a {role}.

GOAL:
{goal}

BACKGROUND:
{backstory}

INSTRUCTIONS:
- Work only from the data and context you are given
- Be specific: cite column names and values when you make a claim
- Do not invent rows, columns, or figures that are not in the data{tool_instructions}"#;

const TOOL_INSTRUCTIONS: &str = r#"
- You can run SQL against BigQuery with the run_bigquery_query tool
- Call the tool instead of guessing when you need data you were not given"#;

/// Builds the system prompt for a stage persona.
pub fn build_system_prompt(role: &str, goal: &str, backstory: &str, with_tools: bool) -> String {
    SYSTEM_PROMPT_TEMPLATE
        .replace("{role}", role)
        .replace("{goal}", goal)
        .replace("{backstory}", backstory)
        .replace(
            "{tool_instructions}",
            if with_tools { TOOL_INSTRUCTIONS } else { "" },
        )
}

/// Builds the task message, with any upstream context appended.
///
/// Rendered in one pass: the description may carry caller SQL, which must
/// reach the LLM byte for byte.
pub fn build_task_prompt(description: &str, expected_output: &str, context: &[String]) -> String {
    let mut prompt = format!("TASK:\n{description}\n\nEXPECTED OUTPUT:\n{expected_output}");

    for block in context {
        prompt.push_str("\n\n");
        prompt.push_str(block);
    }
    prompt
}

/// Builds the complete message list for a stage call.
///
/// Combines the system prompt, remembered exchanges, and the current task.
pub fn build_messages(system_prompt: &str, history: &[Message], task: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system_prompt));
    messages.extend(history.iter().cloned());
    messages.push(Message::user(task));
    messages
}
