//! Core types, vocabularies, and entity normalization for Dziwani.

pub mod envelope;
pub mod normalize;
pub mod query;
pub mod record;
pub mod schema;
pub mod vocab;

pub use envelope::{
    ChatRequest, ConversationTurn, ItemKind, PaginationState, ResponseEnvelope, ResponseMetadata,
    ResultItem,
};
pub use normalize::{
    EntityMatch, MatchKind, Normalized, Normalizer, normalize_district, normalize_sector,
    normalize_status,
};
pub use query::{
    Aggregate, AggregateFunction, BudgetRange, FilterCategory, GroupBy, QueryClassification,
    QueryParameters, QueryType, TimeRange,
};
pub use record::{ProjectRecord, Row};
pub use schema::dashboard;
