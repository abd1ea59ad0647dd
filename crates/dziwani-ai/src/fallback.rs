//! Completion-service fallback: prompt construction, response parsing, and
//! merging with the pattern result.

use std::sync::LazyLock;

use dziwani_core::record::lenient_f64;
use dziwani_core::vocab::{DISTRICTS, SECTORS, STATUSES};
use dziwani_core::{
    Aggregate, Normalizer, QueryClassification, QueryParameters, QueryType,
    query::UnknownQueryType,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::patterns::parse_date_bound;

/// Previous user messages included in the prompt.
pub const MAX_CONTEXT_MESSAGES: usize = 3;

#[derive(Error, Debug)]
pub enum FallbackError {
    #[error("no JSON object in completion")]
    NoJson,
    #[error("malformed classification JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    UnknownType(#[from] UnknownQueryType),
}

pub const SYSTEM_PROMPT: &str = "You classify questions about a catalog of infrastructure \
projects in Malawi. Reply with a single JSON object and nothing else.";

/// Build the classification prompt for `question`, with up to
/// [`MAX_CONTEXT_MESSAGES`] earlier user messages for context.
pub fn build_prompt(question: &str, context: &[String]) -> String {
    let mut prompt = String::new();
    prompt.push_str("Classify the question below and extract its filters.\n\n");
    prompt.push_str(
        "query_type is one of: district, sector, status, budget, time, specific, \
         combined, general, greeting, unrelated.\n",
    );
    prompt.push_str(&format!("Known districts: {}.\n", DISTRICTS.join(", ")));
    prompt.push_str(&format!("Known sectors: {}.\n", SECTORS.join(", ")));
    prompt.push_str(&format!("Known statuses: {}.\n\n", STATUSES.join(", ")));
    prompt.push_str(
        "Respond with JSON of the form:\n\
         {\"query_type\": \"...\", \"confidence\": 0.0, \
         \"project_identifier\": null, \"filters\": {\
         \"districts\": [], \"sectors\": [], \"statuses\": [], \
         \"budget_range\": {\"min\": null, \"max\": null}, \
         \"time_range\": {\"start\": null, \"end\": null}}}\n\
         Dates are YYYY or YYYY-MM-DD. Budgets are plain numbers in MWK.\n",
    );

    let recent: Vec<&String> = context
        .iter()
        .rev()
        .take(MAX_CONTEXT_MESSAGES)
        .collect();
    if !recent.is_empty() {
        prompt.push_str("\nEarlier messages in this conversation:\n");
        for message in recent.into_iter().rev() {
            prompt.push_str(&format!("- {message}\n"));
        }
    }

    prompt.push_str(&format!("\nQuestion: {question}\n"));
    prompt
}

// ── Parsing ──

#[derive(Debug, Deserialize)]
struct Payload {
    query_type: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    project_identifier: Option<String>,
    #[serde(default)]
    filters: Filters,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Filters {
    #[serde(deserialize_with = "string_list")]
    districts: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    sectors: Vec<String>,
    #[serde(alias = "status", deserialize_with = "string_list")]
    statuses: Vec<String>,
    budget_range: Option<BudgetBounds>,
    time_range: Option<TimeBounds>,
    project_identifier: Option<String>,
    aggregate: Option<Aggregate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BudgetBounds {
    #[serde(deserialize_with = "lenient_f64")]
    min: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    max: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimeBounds {
    start: Option<Value>,
    end: Option<Value>,
}

/// Accept `["a", "b"]`, `"a"`, or `null`.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => vec![s],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Locate the JSON object in a completion: a fenced ```json block if
/// present, else the span from the first `{` to the last `}`.
pub fn extract_json(raw: &str) -> Option<&str> {
    if let Some(m) = FENCED.captures(raw).and_then(|c| c.get(1)) {
        return Some(m.as_str());
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse a completion into a classification.
///
/// District, sector, and status values are normalized against the
/// vocabularies. Values that do not normalize are dropped.
pub fn parse_response(
    raw: &str,
    normalizer: &Normalizer,
) -> Result<QueryClassification, FallbackError> {
    let json = extract_json(raw).ok_or(FallbackError::NoJson)?;
    let payload: Payload = serde_json::from_str(json)?;
    let query_type: QueryType = payload.query_type.trim().to_lowercase().parse()?;
    let filters = payload.filters;

    let mut builder = QueryParameters::builder();
    for d in &filters.districts {
        match normalizer.district(d).canonical() {
            Some(canonical) => builder = builder.district(canonical),
            None => debug!(district = %d, "dropping unknown district"),
        }
    }
    for s in &filters.sectors {
        match normalizer.sector(s).canonical() {
            Some(canonical) => builder = builder.sector(canonical),
            None => debug!(sector = %s, "dropping unknown sector"),
        }
    }
    for s in &filters.statuses {
        match normalizer.status(s).canonical() {
            Some(canonical) => builder = builder.status(canonical),
            None => debug!(status = %s, "dropping unknown status"),
        }
    }
    if let Some(b) = filters.budget_range {
        builder = builder.budget(b.min, b.max);
    }
    if let Some(t) = filters.time_range {
        builder = builder.time(
            t.start.as_ref().and_then(|v| date_bound(v, false)),
            t.end.as_ref().and_then(|v| date_bound(v, true)),
        );
    }
    // Top-level identifier first; some models nest it under filters.
    let identifier = payload
        .project_identifier
        .or(filters.project_identifier)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    if let Some(id) = identifier {
        builder = builder.project_identifier(id);
    }
    if let Some(aggregate) = filters.aggregate {
        builder = builder.aggregate(aggregate);
    }

    Ok(QueryClassification::new(
        query_type,
        payload.confidence.unwrap_or(0.5),
        builder.build(),
    ))
}

fn date_bound(value: &Value, end_of_year: bool) -> Option<chrono::NaiveDate> {
    match value {
        Value::String(s) => parse_date_bound(s, end_of_year),
        Value::Number(n) => parse_date_bound(&n.to_string(), end_of_year),
        _ => None,
    }
}

// ── Merging ──

/// Combine pattern and fallback results.
///
/// Filters are unioned, pattern values winning for scalars. Confidence is the
/// larger of the two. The type is recomputed from the merged filters so a
/// merged result is never less specific than either input.
pub fn merge(pattern: &QueryClassification, fallback: &QueryClassification) -> QueryClassification {
    let parameters = pattern.parameters.merge(&fallback.parameters);
    let confidence = pattern.confidence.max(fallback.confidence);
    let query_type = resolve_type(&parameters).unwrap_or(
        if pattern.query_type == QueryType::General && fallback.query_type.is_conversational() {
            fallback.query_type
        } else {
            QueryType::General
        },
    );
    QueryClassification::new(query_type, confidence, parameters)
}

/// Query type implied by populated parameters, or `None` when nothing is set.
pub fn resolve_type(parameters: &QueryParameters) -> Option<QueryType> {
    if parameters.project_identifier().is_some() {
        return Some(QueryType::Specific);
    }
    match parameters.populated_categories().as_slice() {
        [] => None,
        [single] => Some(single.query_type()),
        _ => Some(QueryType::Combined),
    }
}

static FENCED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("Invalid regex")
});

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn n() -> Normalizer {
        Normalizer::default()
    }

    #[test]
    fn extract_json_from_fence() {
        let raw = "Sure!\n```json\n{\"query_type\": \"sector\"}\n```\nHope that helps.";
        assert_eq!(extract_json(raw), Some("{\"query_type\": \"sector\"}"));
    }

    #[test]
    fn extract_json_from_prose() {
        let raw = "Here you go: {\"a\": {\"b\": 1}} done";
        assert_eq!(extract_json(raw), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn parses_full_payload() {
        let raw = r#"{
            "query_type": "combined",
            "confidence": 0.8,
            "filters": {
                "districts": ["zomba", "Atlantis"],
                "sectors": ["schools"],
                "statuses": "in progress",
                "budget_range": {"min": "1000000", "max": null},
                "time_range": {"start": 2021, "end": "2022"}
            }
        }"#;
        let c = parse_response(raw, &n()).unwrap();
        assert_eq!(c.query_type, QueryType::Combined);
        assert_eq!(c.confidence, 0.8);
        assert_eq!(c.parameters.districts(), &BTreeSet::from(["Zomba".to_string()]));
        assert_eq!(c.parameters.sectors(), &BTreeSet::from(["education".to_string()]));
        assert_eq!(c.parameters.statuses(), &BTreeSet::from(["ongoing".to_string()]));
        assert_eq!(c.parameters.budget_range().min(), Some(1_000_000.0));
        let t = c.parameters.time_range();
        assert_eq!(t.start(), chrono::NaiveDate::from_ymd_opt(2021, 1, 1));
        assert_eq!(t.end(), chrono::NaiveDate::from_ymd_opt(2022, 12, 31));
    }

    #[test]
    fn top_level_project_identifier() {
        let raw = r#"{
            "query_type": "specific",
            "confidence": 0.9,
            "project_identifier": "Zomba Girls Hostel",
            "filters": {"districts": [], "sectors": [], "statuses": []}
        }"#;
        let c = parse_response(raw, &n()).unwrap();
        assert_eq!(c.query_type, QueryType::Specific);
        assert_eq!(c.parameters.project_identifier(), Some("Zomba Girls Hostel"));

        let merged = merge(&QueryClassification::general(0.5), &c);
        assert_eq!(merged.query_type, QueryType::Specific);
        assert_eq!(merged.parameters.project_identifier(), Some("Zomba Girls Hostel"));
    }

    #[test]
    fn nested_identifier_is_accepted_and_top_level_wins() {
        let nested = r#"{"query_type": "specific", "filters": {"project_identifier": "MW-CR-DO"}}"#;
        let c = parse_response(nested, &n()).unwrap();
        assert_eq!(c.parameters.project_identifier(), Some("MW-CR-DO"));

        let both = r#"{"query_type": "specific", "project_identifier": "Balaka Market",
                       "filters": {"project_identifier": "MW-CR-DO"}}"#;
        let c = parse_response(both, &n()).unwrap();
        assert_eq!(c.parameters.project_identifier(), Some("Balaka Market"));

        let blank = r#"{"query_type": "general", "project_identifier": "  "}"#;
        let c = parse_response(blank, &n()).unwrap();
        assert_eq!(c.parameters.project_identifier(), None);
    }

    #[test]
    fn missing_filters_and_confidence_default() {
        let c = parse_response(r#"{"query_type": "General"}"#, &n()).unwrap();
        assert_eq!(c.query_type, QueryType::General);
        assert_eq!(c.confidence, 0.5);
        assert!(!c.parameters.has_filters());
    }

    #[test]
    fn unknown_type_is_an_error() {
        let err = parse_response(r#"{"query_type": "weather"}"#, &n()).unwrap_err();
        assert!(matches!(err, FallbackError::UnknownType(_)));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(matches!(
            parse_response("I am not sure", &n()),
            Err(FallbackError::NoJson)
        ));
        assert!(matches!(
            parse_response("{not json}", &n()),
            Err(FallbackError::Malformed(_))
        ));
    }

    #[test]
    fn prompt_keeps_last_three_context_messages() {
        let context: Vec<String> = ["one", "two", "three", "four"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let prompt = build_prompt("and roads?", &context);
        assert!(!prompt.contains("- one"));
        assert!(prompt.contains("- two\n- three\n- four"));
        assert!(prompt.contains("Question: and roads?"));
        assert!(prompt.contains("Lilongwe"));
    }

    #[test]
    fn merge_unions_and_recomputes_type() {
        let pattern = QueryClassification::new(
            QueryType::District,
            0.5,
            QueryParameters::builder().district("Zomba").build(),
        );
        let fallback = QueryClassification::new(
            QueryType::Sector,
            0.8,
            QueryParameters::builder().sector("health").build(),
        );
        let merged = merge(&pattern, &fallback);
        assert_eq!(merged.query_type, QueryType::Combined);
        assert_eq!(merged.confidence, 0.8);
        assert!(merged.parameters.districts().contains("Zomba"));
        assert!(merged.parameters.sectors().contains("health"));
    }

    #[test]
    fn merge_never_loses_pattern_filters() {
        let pattern = QueryClassification::new(
            QueryType::Status,
            0.55,
            QueryParameters::builder().status("delayed").build(),
        );
        let merged = merge(&pattern, &QueryClassification::general(0.9));
        assert_eq!(merged.query_type, QueryType::Status);
        assert!(merged.parameters.statuses().contains("delayed"));
        assert!(merged.confidence >= pattern.confidence);
    }

    #[test]
    fn merge_accepts_conversational_verdict_for_general() {
        let pattern = QueryClassification::general(0.5);
        let merged = merge(&pattern, &QueryClassification::unrelated());
        assert_eq!(merged.query_type, QueryType::Unrelated);
    }

    #[test]
    fn identifier_resolves_to_specific() {
        let params = QueryParameters::builder()
            .project_identifier("MW-CR-DO")
            .district("Zomba")
            .build();
        assert_eq!(resolve_type(&params), Some(QueryType::Specific));
        assert_eq!(resolve_type(&QueryParameters::default()), None);
    }
}
