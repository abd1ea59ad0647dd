//! SQL generation, safety validation, and execution against the project
//! catalog.

pub mod builder;
mod error;
pub mod executor;
pub mod safety;

pub use builder::{DEFAULT_PAGE_SIZE, SqlBuilder, apply_paging, strip_paging};
pub use error::StoreError;
pub use executor::SqlExecutor;
pub use safety::{SafetyViolation, looks_like_injection, validate_sql};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::{DuckStore, SharedStore};
