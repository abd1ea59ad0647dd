//! Request pipeline for Dziwani: classification, SQL generation, execution,
//! response formatting and "show more" pagination.

pub mod config;
pub mod engine;
pub mod format;
pub mod pagination;

pub use config::{CompletionConfig, ConfigError, EngineConfig};
pub use engine::Engine;
