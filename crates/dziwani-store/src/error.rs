use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("CSV file not found: {0}")]
    CsvNotFound(std::path::PathBuf),

    #[error("no results for query")]
    NoResults,

    #[error("refusing to execute unsafe SQL: {0}")]
    Unsafe(#[from] crate::safety::SafetyViolation),

    #[error("query exceeded {0:?}")]
    Timeout(Duration),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("row decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
