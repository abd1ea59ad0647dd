//! Optional one-paragraph explanation of a page of results.

use std::time::Duration;

use dziwani_core::Row;
use dziwani_llm::{Completion, CompletionParams};
use tracing::{debug, warn};

/// Rows from the page included in the prompt.
const MAX_ROWS: usize = 10;

const SYSTEM_PROMPT: &str = "You summarise infrastructure project data for \
members of the public in Malawi. Answer in one short paragraph of plain text. \
Only use facts present in the data.";

pub fn explanation_prompt(question: &str, rows: &[Row], total_results: usize) -> String {
    let sample: Vec<&Row> = rows.iter().take(MAX_ROWS).collect();
    let data = serde_json::to_string_pretty(&sample).unwrap_or_default();
    format!(
        "Question: {question}\n\
         Matching projects: {total_results}\n\
         First page of results:\n{data}\n\n\
         Explain briefly what these results show."
    )
}

/// Ask the completion service to explain `rows`.
///
/// Returns `None` on any failure or timeout; the caller carries on without
/// an explanation.
pub async fn explain(
    completion: &dyn Completion,
    question: &str,
    rows: &[Row],
    total_results: usize,
    timeout: Duration,
) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let prompt = explanation_prompt(question, rows, total_results);
    let params = CompletionParams::default().with_system(SYSTEM_PROMPT);

    match tokio::time::timeout(timeout, completion.complete(&prompt, &params)).await {
        Ok(Ok(text)) => {
            let text = text.trim().to_string();
            debug!(chars = text.len(), "explanation received");
            (!text.is_empty()).then_some(text)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "explanation failed");
            None
        }
        Err(_) => {
            warn!("explanation timed out");
            None
        }
    }
}
