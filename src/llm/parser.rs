//! SQL code-fence helpers.
//!
//! The Query stage receives its SQL inside a ```sql fence; these helpers
//! build and read that fence.

/// Wraps SQL in a ```sql fence.
pub fn fence_sql(sql: &str) -> String {
    format!("```sql\n{}\n```", sql)
}

/// Extracts the contents of the first ```sql block in `text`.
///
/// Returns `None` when there is no complete block.
pub fn extract_sql_block(text: &str) -> Option<String> {
    let start_pattern = "```sql";
    let start_idx = text.find(start_pattern)?;

    // Content starts on the line after the opening fence
    let after_fence = start_idx + start_pattern.len();
    let content_start = text[after_fence..].find('\n').map(|i| after_fence + i + 1)?;

    let end_idx = text[content_start..].find("```")?;
    let block = &text[content_start..content_start + end_idx];

    Some(block.strip_suffix('\n').unwrap_or(block).to_string())
}
