//! Classification types shared by the classifier, the SQL builder, and the
//! response formatter.
//!
//! [`QueryParameters`] is validated once, when it is built: range bounds are
//! put in order and project identifiers are trimmed. After that it is never
//! mutated. Merging two parameter sets produces a new value.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Query type ──

/// What the user is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Unrelated,
    Greeting,
    General,
    Specific,
    District,
    Sector,
    Status,
    Budget,
    Time,
    Combined,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrelated => "unrelated",
            Self::Greeting => "greeting",
            Self::General => "general",
            Self::Specific => "specific",
            Self::District => "district",
            Self::Sector => "sector",
            Self::Status => "status",
            Self::Budget => "budget",
            Self::Time => "time",
            Self::Combined => "combined",
        }
    }

    /// Greetings and unrelated chatter never reach the store.
    pub fn is_conversational(&self) -> bool {
        matches!(self, Self::Greeting | Self::Unrelated)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown query type: {0}")]
pub struct UnknownQueryType(pub String);

impl FromStr for QueryType {
    type Err = UnknownQueryType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unrelated" => Ok(Self::Unrelated),
            "greeting" => Ok(Self::Greeting),
            "general" => Ok(Self::General),
            "specific" => Ok(Self::Specific),
            "district" => Ok(Self::District),
            "sector" => Ok(Self::Sector),
            "status" => Ok(Self::Status),
            "budget" => Ok(Self::Budget),
            "time" => Ok(Self::Time),
            "combined" => Ok(Self::Combined),
            other => Err(UnknownQueryType(other.to_string())),
        }
    }
}

/// A filter family that can be populated independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterCategory {
    District,
    Sector,
    Status,
    Budget,
    Time,
}

impl FilterCategory {
    /// Query type when this is the only populated category.
    pub fn query_type(&self) -> QueryType {
        match self {
            Self::District => QueryType::District,
            Self::Sector => QueryType::Sector,
            Self::Status => QueryType::Status,
            Self::Budget => QueryType::Budget,
            Self::Time => QueryType::Time,
        }
    }
}

// ── Ranges ──

/// Budget bounds in MWK. `min <= max` whenever both are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Bounds<f64>")]
pub struct BudgetRange {
    min: Option<f64>,
    max: Option<f64>,
}

impl BudgetRange {
    /// Build a range, swapping the bounds if they arrive reversed.
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        let (min, max) = ordered(min, max);
        Self { min, max }
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Fill missing bounds from `other`.
    pub fn or(&self, other: &Self) -> Self {
        Self::new(self.min.or(other.min), self.max.or(other.max))
    }
}

/// Date bounds. `start <= end` whenever both are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Bounds<NaiveDate>")]
pub struct TimeRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl TimeRange {
    /// Build a range, swapping the bounds if they arrive reversed.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let (start, end) = ordered(start, end);
        Self { start, end }
    }

    /// January 1 through December 31 of `year`.
    pub fn year(year: i32) -> Self {
        Self::new(year_start(year), year_end(year))
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Fill missing bounds from `other`.
    pub fn or(&self, other: &Self) -> Self {
        Self::new(self.start.or(other.start), self.end.or(other.end))
    }
}

pub fn year_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

pub fn year_end(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31)
}

#[derive(Deserialize)]
#[serde(bound = "T: Deserialize<'de>")]
struct Bounds<T> {
    #[serde(default, alias = "start")]
    min: Option<T>,
    #[serde(default, alias = "end")]
    max: Option<T>,
}

impl From<Bounds<f64>> for BudgetRange {
    fn from(b: Bounds<f64>) -> Self {
        Self::new(b.min, b.max)
    }
}

impl From<Bounds<NaiveDate>> for TimeRange {
    fn from(b: Bounds<NaiveDate>) -> Self {
        Self::new(b.min, b.max)
    }
}

fn ordered<T: PartialOrd>(lo: Option<T>, hi: Option<T>) -> (Option<T>, Option<T>) {
    match (lo, hi) {
        (Some(a), Some(b)) if a > b => (Some(b), Some(a)),
        other => other,
    }
}

// ── Aggregates ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    Sum,
    Average,
}

/// Column an aggregate is broken down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    District,
    Sector,
    Status,
    FiscalYear,
}

impl GroupBy {
    /// Plural noun used in breakdown text.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::District => "districts",
            Self::Sector => "sectors",
            Self::Status => "statuses",
            Self::FiscalYear => "fiscal years",
        }
    }
}

/// A request for a computed summary instead of a row listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub function: AggregateFunction,
    #[serde(default)]
    pub group_by: Option<GroupBy>,
}

// ── Parameters ──

/// Filters and identifiers extracted from a question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParameters {
    project_identifier: Option<String>,
    districts: BTreeSet<String>,
    sectors: BTreeSet<String>,
    statuses: BTreeSet<String>,
    budget_range: BudgetRange,
    time_range: TimeRange,
    aggregate: Option<Aggregate>,
}

impl QueryParameters {
    pub fn builder() -> ParametersBuilder {
        ParametersBuilder::default()
    }

    pub fn project_identifier(&self) -> Option<&str> {
        self.project_identifier.as_deref()
    }

    pub fn districts(&self) -> &BTreeSet<String> {
        &self.districts
    }

    pub fn sectors(&self) -> &BTreeSet<String> {
        &self.sectors
    }

    pub fn statuses(&self) -> &BTreeSet<String> {
        &self.statuses
    }

    pub fn budget_range(&self) -> BudgetRange {
        self.budget_range
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn aggregate(&self) -> Option<Aggregate> {
        self.aggregate
    }

    /// Filter categories with at least one value, in a fixed order.
    pub fn populated_categories(&self) -> Vec<FilterCategory> {
        let mut out = Vec::new();
        if !self.districts.is_empty() {
            out.push(FilterCategory::District);
        }
        if !self.sectors.is_empty() {
            out.push(FilterCategory::Sector);
        }
        if !self.statuses.is_empty() {
            out.push(FilterCategory::Status);
        }
        if !self.budget_range.is_empty() {
            out.push(FilterCategory::Budget);
        }
        if !self.time_range.is_empty() {
            out.push(FilterCategory::Time);
        }
        out
    }

    pub fn has_filters(&self) -> bool {
        !self.populated_categories().is_empty()
    }

    /// Union of both parameter sets.
    ///
    /// Set-valued filters are unioned. Scalar values (identifier, range
    /// bounds, aggregate) come from `self` when present, else from `other`.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            project_identifier: self
                .project_identifier
                .clone()
                .or_else(|| other.project_identifier.clone()),
            districts: self.districts.union(&other.districts).cloned().collect(),
            sectors: self.sectors.union(&other.sectors).cloned().collect(),
            statuses: self.statuses.union(&other.statuses).cloned().collect(),
            budget_range: self.budget_range.or(&other.budget_range),
            time_range: self.time_range.or(&other.time_range),
            aggregate: self.aggregate.or(other.aggregate),
        }
    }
}

/// Accumulates extracted values and produces a validated [`QueryParameters`].
#[derive(Debug, Default)]
pub struct ParametersBuilder {
    inner: QueryParameters,
}

impl ParametersBuilder {
    pub fn project_identifier(mut self, id: impl Into<String>) -> Self {
        let id = id.into().trim().to_string();
        self.inner.project_identifier = (!id.is_empty()).then_some(id);
        self
    }

    pub fn district(mut self, d: impl Into<String>) -> Self {
        self.inner.districts.insert(d.into());
        self
    }

    pub fn sector(mut self, s: impl Into<String>) -> Self {
        self.inner.sectors.insert(s.into());
        self
    }

    pub fn status(mut self, s: impl Into<String>) -> Self {
        self.inner.statuses.insert(s.into());
        self
    }

    pub fn budget(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.inner.budget_range = BudgetRange::new(min, max);
        self
    }

    pub fn time(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.inner.time_range = TimeRange::new(start, end);
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.inner.aggregate = Some(aggregate);
        self
    }

    pub fn build(self) -> QueryParameters {
        self.inner
    }
}

// ── Classification ──

/// The classifier's verdict for one question. Created fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryClassification {
    pub query_type: QueryType,
    /// 0.0 to 1.0.
    pub confidence: f32,
    pub parameters: QueryParameters,
}

impl QueryClassification {
    /// Build a classification, clamping confidence into `[0.0, 1.0]`.
    pub fn new(query_type: QueryType, confidence: f32, parameters: QueryParameters) -> Self {
        Self {
            query_type,
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
            parameters,
        }
    }

    pub fn greeting() -> Self {
        Self::new(QueryType::Greeting, 0.95, QueryParameters::default())
    }

    pub fn unrelated() -> Self {
        Self::new(QueryType::Unrelated, 0.95, QueryParameters::default())
    }

    pub fn general(confidence: f32) -> Self {
        Self::new(QueryType::General, confidence, QueryParameters::default())
    }

    pub fn is_aggregate(&self) -> bool {
        self.parameters.aggregate.is_some()
    }
}
