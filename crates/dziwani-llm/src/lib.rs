//! Completion-service layer: the `Completion` contract and an HTTP client for
//! OpenAI-compatible chat completion endpoints.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpCompletionClient;

#[derive(Error, Debug)]
pub enum CompletionError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion timed out")]
    Timeout,
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("completion contained no text")]
    Empty,
}

/// Endpoint used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.together.xyz/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo";

/// Sampling options for one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    /// Instruction sent ahead of the prompt, if any.
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Ask the service for a JSON object response.
    pub json: bool,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            system: None,
            temperature: 0.1,
            max_tokens: Some(512),
            json: false,
        }
    }
}

impl CompletionParams {
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// A text-completion service: `complete(prompt, params) -> text`.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, CompletionError>;
}
