//! Request and response shapes at the engine boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::QueryType;

// ── Inbound ──

/// A question from the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Earlier turns of the conversation, oldest first. Pagination state is
    /// rebuilt from here on every request.
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }
}

/// One earlier exchange, as remembered by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub message: String,
    #[serde(default)]
    pub sql_query: String,
    #[serde(default)]
    pub pagination: Option<PaginationState>,
}

impl ConversationTurn {
    /// Remember a question together with the response it produced.
    pub fn from_response(message: impl Into<String>, response: &ResponseEnvelope) -> Self {
        Self {
            message: message.into(),
            sql_query: response.metadata.sql_query.clone(),
            pagination: response.metadata.pagination,
        }
    }
}

// ── Outbound ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Text,
    List,
    ProjectDetails,
    Error,
}

/// A tagged piece of the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl ResultItem {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Text,
            message: message.into(),
            data: Value::Null,
        }
    }

    pub fn list(message: impl Into<String>, data: Value) -> Self {
        Self {
            kind: ItemKind::List,
            message: message.into(),
            data,
        }
    }

    pub fn project_details(message: impl Into<String>, data: Value) -> Self {
        Self {
            kind: ItemKind::ProjectDetails,
            message: message.into(),
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Error,
            message: message.into(),
            data: Value::Null,
        }
    }
}

/// Window over a result set. Derived per request, never stored server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "PaginationWire", from = "PaginationWire")]
pub struct PaginationState {
    pub offset: usize,
    pub limit: usize,
    pub total_results: usize,
}

impl PaginationState {
    /// State for 1-based `page` of `limit` rows. Page 0 is read as page 1.
    pub fn for_page(page: usize, limit: usize, total_results: usize) -> Self {
        let limit = limit.max(1);
        Self {
            offset: page.saturating_sub(1).saturating_mul(limit),
            limit,
            total_results,
        }
    }

    pub fn current_page(&self) -> usize {
        self.offset / self.limit.max(1) + 1
    }

    pub fn total_pages(&self) -> usize {
        self.total_results.div_ceil(self.limit.max(1))
    }

    /// `offset` and `limit` can arrive from caller history; the page end
    /// never overflows.
    pub fn has_more(&self) -> bool {
        self.offset
            .checked_add(self.limit)
            .is_some_and(|end| end < self.total_results)
    }

    /// Rows left after this page.
    pub fn remaining(&self) -> usize {
        self.total_results
            .saturating_sub(self.offset.saturating_add(self.limit))
    }

    /// The following page, if any rows remain.
    pub fn next(&self) -> Option<Self> {
        self.has_more().then(|| Self {
            offset: self.offset.saturating_add(self.limit),
            ..*self
        })
    }
}

#[derive(Serialize, Deserialize)]
struct PaginationWire {
    offset: usize,
    limit: usize,
    total_results: usize,
    #[serde(default)]
    current_page: usize,
    #[serde(default)]
    total_pages: usize,
    #[serde(default)]
    has_more: bool,
}

impl From<PaginationState> for PaginationWire {
    fn from(p: PaginationState) -> Self {
        Self {
            offset: p.offset,
            limit: p.limit,
            total_results: p.total_results,
            current_page: p.current_page(),
            total_pages: p.total_pages(),
            has_more: p.has_more(),
        }
    }
}

impl From<PaginationWire> for PaginationState {
    fn from(w: PaginationWire) -> Self {
        Self {
            offset: w.offset,
            limit: w.limit.max(1),
            total_results: w.total_results,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub total_results: usize,
    /// Seconds spent handling the request.
    pub query_time: f64,
    /// Empty when no SQL was generated.
    pub sql_query: String,
    #[serde(default)]
    pub pagination: Option<PaginationState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_type: Option<QueryType>,
    /// Plain-language restatement of how the question was read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub understanding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// The engine's answer. Always well-formed, whatever went wrong.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub results: Vec<ResultItem>,
    pub metadata: ResponseMetadata,
}

impl ResponseEnvelope {
    /// A single text item with no SQL behind it.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            results: vec![ResultItem::text(text)],
            metadata: ResponseMetadata {
                total_results: 1,
                ..ResponseMetadata::default()
            },
        }
    }

    pub fn first_message(&self) -> Option<&str> {
        self.results.first().map(|r| r.message.as_str())
    }

    pub fn has_kind(&self, kind: ItemKind) -> bool {
        self.results.iter().any(|r| r.kind == kind)
    }
}
