//! Query understanding: a deterministic pattern tier, escalation to a
//! completion service when the patterns are unsure, and result explanations.

pub mod classifier;
pub mod explain;
pub mod fallback;
pub mod patterns;

pub use classifier::{
    DEFAULT_COMPLETION_TIMEOUT, DEFAULT_ESCALATION_THRESHOLD, PatternClassifier, QueryClassifier,
};
pub use fallback::FallbackError;
