//! Two-tier query classification.
//!
//! The pattern tier runs a fixed decision ladder over the question:
//!
//! 1. Greeting or unrelated chatter short-circuits with fixed confidence
//! 2. A project code or name yields a `specific` lookup
//! 3. District, sector, status, budget and time extractors run independently
//! 4. The populated categories decide the type: none is `general`, one is
//!    that category, several are `combined`
//!
//! When the pattern tier is unsure (type `general` or confidence under the
//! escalation threshold) and a completion service is configured, the
//! question is sent there and the two results are merged. Any failure of the
//! service leaves the pattern result in place.

use std::sync::Arc;
use std::time::Duration;

use dziwani_core::{Normalizer, QueryClassification, QueryParameters, QueryType};
use dziwani_llm::{Completion, CompletionParams};
use tracing::{debug, info, warn};

use crate::fallback::{self, SYSTEM_PROMPT};
use crate::patterns::{
    detect_aggregate, extract_budget, extract_districts, extract_project_identifier,
    extract_sectors, extract_statuses, extract_time, is_greeting, is_unrelated,
};

pub const DEFAULT_ESCALATION_THRESHOLD: f32 = 0.6;
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

/// Confidence of a pattern result that found no filters.
const GENERAL_CONFIDENCE: f32 = 0.5;
/// Added per extra filter category in a combined query.
const COMBINED_STEP: f32 = 0.1;
/// Confidence given to a fallback reply that could not be parsed.
const UNPARSED_CONFIDENCE: f32 = 0.5;

/// Deterministic first tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternClassifier {
    normalizer: Normalizer,
}

impl PatternClassifier {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn classify(&self, text: &str) -> QueryClassification {
        let text = text.trim();
        if is_greeting(text) {
            return QueryClassification::greeting();
        }
        if is_unrelated(text) {
            return QueryClassification::unrelated();
        }

        if let Some(id) = extract_project_identifier(text, &self.normalizer) {
            return QueryClassification::new(
                QueryType::Specific,
                id.confidence,
                QueryParameters::builder().project_identifier(id.value).build(),
            );
        }

        let lower = text.to_lowercase();
        let mut builder = QueryParameters::builder();
        let mut scores = Vec::new();
        let mut district_count = 0;

        if let Some(found) = extract_districts(&lower, &self.normalizer) {
            district_count = found.value.len();
            for d in found.value {
                builder = builder.district(d);
            }
            scores.push(found.confidence);
        }
        if let Some(found) = extract_sectors(&lower) {
            for s in found.value {
                builder = builder.sector(s);
            }
            scores.push(found.confidence);
        }
        if let Some(found) = extract_statuses(&lower) {
            for s in found.value {
                builder = builder.status(s);
            }
            scores.push(found.confidence);
        }
        if let Some(found) = extract_budget(&lower) {
            builder = builder.budget(found.value.min(), found.value.max());
            scores.push(found.confidence);
        }
        if let Some(found) = extract_time(&lower) {
            builder = builder.time(found.value.start(), found.value.end());
            scores.push(found.confidence);
        }
        if let Some(aggregate) = detect_aggregate(&lower, district_count) {
            builder = builder.aggregate(aggregate);
        }

        let parameters = builder.build();
        let query_type = fallback::resolve_type(&parameters).unwrap_or(QueryType::General);
        QueryClassification::new(query_type, combined_confidence(&scores), parameters)
    }
}

/// Highest category confidence plus a step per additional category.
fn combined_confidence(scores: &[f32]) -> f32 {
    let Some(max) = scores.iter().copied().reduce(f32::max) else {
        return GENERAL_CONFIDENCE;
    };
    let extra = scores.len().saturating_sub(1) as f32 * COMBINED_STEP;
    (max + extra).min(1.0)
}

/// Pattern tier with optional escalation to a completion service.
pub struct QueryClassifier {
    patterns: PatternClassifier,
    completion: Option<Arc<dyn Completion>>,
    escalation_threshold: f32,
    timeout: Duration,
    temperature: f32,
}

impl QueryClassifier {
    /// Pattern-only classifier.
    pub fn new(patterns: PatternClassifier) -> Self {
        Self {
            patterns,
            completion: None,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            timeout: DEFAULT_COMPLETION_TIMEOUT,
            temperature: CompletionParams::default().temperature,
        }
    }

    pub fn with_completion(mut self, completion: Arc<dyn Completion>, timeout: Duration) -> Self {
        self.completion = Some(completion);
        self.timeout = timeout;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.escalation_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Sampling temperature for escalation calls.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.max(0.0);
        self
    }

    pub fn escalation_threshold(&self) -> f32 {
        self.escalation_threshold
    }

    pub fn patterns(&self) -> &PatternClassifier {
        &self.patterns
    }

    /// Whether a pattern result should be sent to the completion service.
    pub fn should_escalate(&self, pattern: &QueryClassification) -> bool {
        !pattern.query_type.is_conversational()
            && (pattern.query_type == QueryType::General
                || pattern.confidence < self.escalation_threshold)
    }

    /// Classify `text`. `context` holds earlier user messages, oldest first.
    pub async fn classify(&self, text: &str, context: &[String]) -> QueryClassification {
        let pattern = self.patterns.classify(text);
        debug!(
            query_type = %pattern.query_type,
            confidence = pattern.confidence,
            "pattern classification"
        );

        if !self.should_escalate(&pattern) {
            return pattern;
        }
        let Some(completion) = &self.completion else {
            return pattern;
        };

        info!(confidence = pattern.confidence, "escalating to completion service");
        let prompt = fallback::build_prompt(text, context);
        let params = CompletionParams {
            temperature: self.temperature,
            ..CompletionParams::default()
        }
        .with_system(SYSTEM_PROMPT)
        .json();

        let raw = match tokio::time::timeout(self.timeout, completion.complete(&prompt, &params)).await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error = %e, "completion failed, keeping pattern result");
                return pattern;
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "completion timed out, keeping pattern result"
                );
                return pattern;
            }
        };

        match fallback::parse_response(&raw, self.patterns.normalizer()) {
            Ok(parsed) => {
                let merged = fallback::merge(&pattern, &parsed);
                debug!(
                    query_type = %merged.query_type,
                    confidence = merged.confidence,
                    "merged classification"
                );
                merged
            }
            Err(e) => {
                warn!(error = %e, "unparseable completion");
                QueryClassification::new(QueryType::General, UNPARSED_CONFIDENCE, pattern.parameters)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use dziwani_core::{AggregateFunction, FilterCategory};
    use dziwani_llm::CompletionError;

    use super::*;

    fn classify(text: &str) -> QueryClassification {
        PatternClassifier::default().classify(text)
    }

    /// Completion stub returning a canned reply and recording prompts.
    struct Canned {
        reply: Result<String, ()>,
        delay: Duration,
        prompts: Mutex<Vec<String>>,
    }

    impl Canned {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                delay: Duration::ZERO,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn slow(reply: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                delay,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Completion for Canned {
        async fn complete(
            &self,
            prompt: &str,
            _params: &CompletionParams,
        ) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone().map_err(|_| CompletionError::Empty)
        }
    }

    fn escalating(completion: Arc<Canned>) -> QueryClassifier {
        QueryClassifier::new(PatternClassifier::default())
            .with_completion(completion, Duration::from_millis(200))
    }

    // ── Pattern ladder ──

    #[test]
    fn district_listing() {
        let c = classify("Show me all projects in Zomba district");
        assert_eq!(c.query_type, QueryType::District);
        assert!(c.parameters.districts().contains("Zomba"));
        assert!(c.confidence >= 0.8);
        assert!(c.parameters.project_identifier().is_none());
    }

    #[test]
    fn total_budget_is_sector_aggregate() {
        let c = classify("What is the total budget for infrastructure projects?");
        assert_eq!(c.query_type, QueryType::Sector);
        let agg = c.parameters.aggregate().unwrap();
        assert_eq!(agg.function, AggregateFunction::Sum);
        assert!(agg.group_by.is_none());
    }

    #[test]
    fn greeting_and_unrelated() {
        let c = classify("hi");
        assert_eq!(c.query_type, QueryType::Greeting);
        assert!(!c.parameters.has_filters());
        assert!(c.confidence > 0.9);

        let c = classify("what's the weather like today?");
        assert_eq!(c.query_type, QueryType::Unrelated);
    }

    #[test]
    fn project_code_lookup() {
        let c = classify("Tell me about MW-CR-DO");
        assert_eq!(c.query_type, QueryType::Specific);
        assert_eq!(c.parameters.project_identifier(), Some("MW-CR-DO"));
        assert!(c.confidence >= 0.9);
    }

    #[test]
    fn combined_query() {
        let c = classify("Show me ongoing projects in the health sector in Lilongwe");
        assert_eq!(c.query_type, QueryType::Combined);
        assert_eq!(
            c.parameters.populated_categories(),
            vec![
                FilterCategory::District,
                FilterCategory::Sector,
                FilterCategory::Status
            ]
        );
        assert!(c.confidence > 0.9);
        assert!(c.confidence <= 1.0);
    }

    #[test]
    fn vague_question_is_general() {
        let c = classify("What is going on with development around here these days?");
        assert_eq!(c.query_type, QueryType::General);
        assert_eq!(c.confidence, GENERAL_CONFIDENCE);
    }

    #[test]
    fn budget_and_time_queries() {
        let c = classify("projects with a budget over 5 million");
        assert_eq!(c.query_type, QueryType::Budget);
        assert_eq!(c.parameters.budget_range().min(), Some(5_000_000.0));

        let c = classify("projects started between 2020 and 2022");
        assert_eq!(c.query_type, QueryType::Time);
        assert!(c.parameters.budget_range().is_empty());
    }

    #[test]
    fn adding_a_category_never_lowers_confidence() {
        let pairs = [
            ("projects in Zomba", "health projects in Zomba"),
            ("health projects", "completed health projects"),
            ("completed projects", "completed projects in Balaka district"),
            ("projects in Dedza", "projects in Dedza over 2 million"),
            ("projects over 2 million", "projects over 2 million since 2021"),
            ("projects in lilongwee", "school projects in lilongwee"),
            ("list everything you have", "list everything you have in Mchinji"),
        ];
        for (base, extended) in pairs {
            let a = classify(base);
            let b = classify(extended);
            assert!(
                b.parameters.populated_categories().len()
                    > a.parameters.populated_categories().len(),
                "{extended} should add a category"
            );
            assert!(
                b.confidence >= a.confidence,
                "{base} ({}) -> {extended} ({})",
                a.confidence,
                b.confidence
            );
        }
    }

    #[test]
    fn confidence_always_in_range() {
        let questions = [
            "",
            "hi",
            "projects in zomba lilongwe blantyre mzimba dedza health water education roads ongoing completed delayed over 5 million since 2019 before 2024",
            "MW-AB-12",
            "???",
        ];
        for q in questions {
            let c = classify(q);
            assert!((0.0..=1.0).contains(&c.confidence), "{q}");
        }
    }

    #[test]
    fn combined_confidence_caps_at_one() {
        assert_eq!(combined_confidence(&[]), GENERAL_CONFIDENCE);
        assert_eq!(combined_confidence(&[0.7]), 0.7);
        assert!((combined_confidence(&[0.8, 0.9]) - 1.0).abs() < 1e-6);
        assert_eq!(combined_confidence(&[0.95, 0.9, 0.9, 0.9]), 1.0);
    }

    // ── Escalation ──

    #[tokio::test]
    async fn confident_pattern_result_is_not_escalated() {
        let completion = Canned::ok(r#"{"query_type": "sector"}"#);
        let classifier = escalating(completion.clone());
        let c = classifier
            .classify("Show me all projects in Zomba district", &[])
            .await;
        assert_eq!(c.query_type, QueryType::District);
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn general_question_is_merged_with_fallback() {
        let completion = Canned::ok(
            r#"```json
            {"query_type": "district", "confidence": 0.8, "filters": {"districts": ["Zomba"]}}
            ```"#,
        );
        let classifier = escalating(completion.clone());
        let c = classifier
            .classify("What's happening near the old capital?", &[])
            .await;
        assert_eq!(completion.calls(), 1);
        assert_eq!(c.query_type, QueryType::District);
        assert!(c.parameters.districts().contains("Zomba"));
        assert_eq!(c.confidence, 0.8);
    }

    #[tokio::test]
    async fn context_messages_reach_the_prompt() {
        let completion = Canned::ok(r#"{"query_type": "general"}"#);
        let classifier = escalating(completion.clone());
        let context = vec!["projects in Zomba".to_string()];
        classifier.classify("and what about the rest?", &context).await;
        let prompts = completion.prompts.lock().unwrap();
        assert!(prompts[0].contains("- projects in Zomba"));
    }

    #[tokio::test]
    async fn unparseable_reply_degrades_to_general() {
        let classifier = escalating(Canned::ok("I think they mean roads, maybe"));
        let c = classifier
            .classify("anything interesting happening near me lately?", &[])
            .await;
        assert_eq!(c.query_type, QueryType::General);
        assert_eq!(c.confidence, UNPARSED_CONFIDENCE);
    }

    #[tokio::test]
    async fn failed_completion_keeps_pattern_result() {
        let question = "projects in mangochee";
        let pattern = classify(question);
        assert!(pattern.confidence < DEFAULT_ESCALATION_THRESHOLD);

        let classifier = escalating(Canned::failing());
        let c = classifier.classify(question, &[]).await;
        assert_eq!(c, pattern);
    }

    #[tokio::test]
    async fn slow_completion_keeps_pattern_result() {
        let completion = Canned::slow(
            r#"{"query_type": "sector", "filters": {"sectors": ["health"]}}"#,
            Duration::from_secs(2),
        );
        let classifier = QueryClassifier::new(PatternClassifier::default())
            .with_completion(completion, Duration::from_millis(50));
        let question = "projects in mangochee";
        let c = classifier.classify(question, &[]).await;
        assert_eq!(c, classify(question));
    }

    #[tokio::test]
    async fn pattern_only_never_escalates() {
        let classifier = QueryClassifier::new(PatternClassifier::default());
        let question = "what is going on with development around here these days?";
        let c = classifier.classify(question, &[]).await;
        assert_eq!(c, classify(question));
        assert_eq!(c.query_type, QueryType::General);
    }

    #[test]
    fn threshold_controls_escalation() {
        let classifier = QueryClassifier::new(PatternClassifier::default()).with_threshold(0.95);
        let district = classify("projects in Zomba district");
        assert!(classifier.should_escalate(&district));
        assert!(!classifier.should_escalate(&QueryClassification::greeting()));

        let lenient = QueryClassifier::new(PatternClassifier::default()).with_threshold(0.0);
        assert!(!lenient.should_escalate(&district));
        assert!(lenient.should_escalate(&QueryClassification::general(0.9)));
    }
}
