//! "show more" requests and pagination rebuilt from caller history.

use dziwani_core::{ConversationTurn, PaginationState};
use dziwani_store::apply_paging;

/// Phrases read as a request for the next page.
pub const SHOW_MORE_PHRASES: &[&str] = &[
    "show more",
    "more",
    "next",
    "next page",
    "more results",
    "load more",
    "see more",
    "continue",
    "show next",
    "onani zambiri",
];

/// Whether `text` asks for the next page of the previous answer.
pub fn is_show_more(text: &str) -> bool {
    let cleaned = text
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    SHOW_MORE_PHRASES.contains(&cleaned.as_str())
}

/// The page after the most recent turn that still has rows to show.
#[derive(Debug, Clone, PartialEq)]
pub struct Continuation<'a> {
    pub turn: &'a ConversationTurn,
    /// The question that started the listing, skipping earlier "show more"s.
    pub question: &'a str,
    pub page: PaginationState,
    pub sql: String,
}

/// Find the latest pageable turn and derive the statement for its next page.
pub fn next_page(history: &[ConversationTurn]) -> Option<Continuation<'_>> {
    let (index, turn, page) = history.iter().enumerate().rev().find_map(|(i, turn)| {
        if turn.sql_query.trim().is_empty() {
            return None;
        }
        Some((i, turn, turn.pagination?.next()?))
    })?;
    let question = history[..=index]
        .iter()
        .rev()
        .map(|t| t.message.as_str())
        .find(|m| !is_show_more(m))
        .unwrap_or(turn.message.as_str());
    Some(Continuation {
        turn,
        question,
        page,
        sql: apply_paging(&turn.sql_query, &page),
    })
}

/// Earlier user questions to hand to the completion service, oldest first.
/// Pagination commands carry no meaning of their own and are skipped.
pub fn context_messages(history: &[ConversationTurn]) -> Vec<String> {
    history
        .iter()
        .map(|turn| turn.message.trim())
        .filter(|m| !m.is_empty() && !is_show_more(m))
        .map(str::to_string)
        .collect()
}
