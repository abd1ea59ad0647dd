//! The request pipeline: text → classification → SQL → rows → envelope.
//!
//! Every path returns a well-formed [`ResponseEnvelope`]. Failures of the
//! completion service fall back to the pattern result; failures of the store
//! become an `error` item whose detail is only logged.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dziwani_ai::{PatternClassifier, QueryClassifier, explain};
use dziwani_core::{
    ChatRequest, ConversationTurn, ItemKind, Normalizer, PaginationState, QueryClassification,
    QueryType, ResponseEnvelope, ResultItem, Row,
};
use dziwani_llm::Completion;
use dziwani_store::{SqlBuilder, SqlExecutor, looks_like_injection, validate_sql};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::format;
use crate::pagination;

/// Answers questions about the project catalog.
pub struct Engine {
    classifier: QueryClassifier,
    builder: SqlBuilder,
    executor: Arc<dyn SqlExecutor>,
    explainer: Option<Arc<dyn Completion>>,
    explain_timeout: Duration,
}

impl Engine {
    /// Pattern-only engine with default page size.
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self::with_parts(
            QueryClassifier::new(PatternClassifier::default()),
            SqlBuilder::default(),
            executor,
        )
    }

    pub fn with_parts(
        classifier: QueryClassifier,
        builder: SqlBuilder,
        executor: Arc<dyn SqlExecutor>,
    ) -> Self {
        Self {
            classifier,
            builder,
            executor,
            explainer: None,
            explain_timeout: Duration::from_secs(10),
        }
    }

    /// Wire an engine from configuration. `completion` enables escalation,
    /// and explanations when `config.explain` is set.
    pub fn from_config(
        config: &EngineConfig,
        executor: Arc<dyn SqlExecutor>,
        completion: Option<Arc<dyn Completion>>,
    ) -> Self {
        let patterns = PatternClassifier::new(Normalizer::new(config.match_ratio));
        let mut classifier =
            QueryClassifier::new(patterns).with_threshold(config.escalation_threshold);
        if let Some(temperature) = config.completion.as_ref().map(|c| c.temperature) {
            classifier = classifier.with_temperature(temperature);
        }
        if let Some(completion) = &completion {
            classifier = classifier.with_completion(completion.clone(), config.completion_timeout);
        }

        let engine = Self::with_parts(classifier, SqlBuilder::new(config.page_size), executor);
        match completion {
            Some(completion) if config.explain => {
                engine.with_explanations(completion, config.completion_timeout)
            }
            _ => engine,
        }
    }

    /// Add a one-paragraph explanation to listing responses.
    pub fn with_explanations(mut self, completion: Arc<dyn Completion>, timeout: Duration) -> Self {
        self.explainer = Some(completion);
        self.explain_timeout = timeout;
        self
    }

    pub fn builder(&self) -> &SqlBuilder {
        &self.builder
    }

    /// Classify `message` with the earlier questions in `history` as context.
    pub async fn classify(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> QueryClassification {
        let context = pagination::context_messages(history);
        self.classifier.classify(message, &context).await
    }

    /// Handle one request. Never fails.
    pub async fn handle(&self, request: &ChatRequest) -> ResponseEnvelope {
        let started = Instant::now();
        let message = request.message.trim();

        let mut response = if message.is_empty() {
            ResponseEnvelope::message(format::EMPTY_QUESTION)
        } else if looks_like_injection(message) {
            warn!(session = ?request.session_id, "rejected suspicious input");
            format::rephrase()
        } else if pagination::is_show_more(message) {
            self.continue_listing(&request.history).await
        } else {
            self.answer(message, &request.history).await
        };

        response.metadata.query_time = started.elapsed().as_secs_f64();
        response.metadata.session_id = request.session_id.clone();
        info!(
            total = response.metadata.total_results,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "handled request"
        );
        response
    }

    async fn answer(&self, message: &str, history: &[ConversationTurn]) -> ResponseEnvelope {
        let classification = self.classify(message, history).await;
        let query_type = classification.query_type;
        debug!(
            %query_type,
            confidence = classification.confidence,
            "classified"
        );

        let mut response = match query_type {
            QueryType::Greeting => ResponseEnvelope::message(format::GREETING),
            QueryType::Unrelated => ResponseEnvelope::message(format::UNRELATED),
            _ => self.run(message, &classification).await,
        };
        response.metadata.query_type = Some(query_type);
        response
    }

    async fn run(&self, message: &str, classification: &QueryClassification) -> ResponseEnvelope {
        let sql = self.builder.build(classification);
        if sql.is_empty() {
            return format::rephrase();
        }

        let rows = match self.execute(&sql).await {
            Ok(rows) => rows,
            Err(response) => return response,
        };

        let mut response = match classification.parameters.project_identifier() {
            Some(_) if classification.query_type == QueryType::Specific => match rows.first() {
                Some(row) => format::project_details(row),
                None => format::no_matches(classification),
            },
            _ if classification.is_aggregate() => format::aggregate(&rows, classification),
            _ => {
                let total = format::total_from_rows(&rows).unwrap_or(rows.len());
                let page = PaginationState::for_page(1, self.builder.page_size(), total);
                format::listing(&rows, classification, page)
            }
        };

        if response.has_kind(ItemKind::List) {
            self.add_explanation(&mut response, message, &rows).await;
        }
        response.metadata.sql_query = sql;
        response
    }

    /// Serve the next page of the latest listing in `history`.
    async fn continue_listing(&self, history: &[ConversationTurn]) -> ResponseEnvelope {
        let Some(next) = pagination::next_page(history) else {
            return ResponseEnvelope::message(format::NO_MORE_RESULTS);
        };
        if let Err(violation) = validate_sql(&next.sql) {
            warn!(%violation, "rejected continuation SQL");
            return format::rephrase();
        }

        let rows = match self.execute(&next.sql).await {
            Ok(rows) => rows,
            Err(response) => return response,
        };
        if rows.is_empty() {
            return ResponseEnvelope::message(format::NO_MORE_RESULTS);
        }

        // Re-read the original question for the summary wording only.
        let classification = self.classifier.patterns().classify(next.question);
        let page = PaginationState {
            total_results: format::total_from_rows(&rows).unwrap_or(next.page.total_results),
            ..next.page
        };
        debug!(offset = page.offset, total = page.total_results, "continuing listing");

        let mut response = format::listing(&rows, &classification, page);
        response.metadata.sql_query = next.sql;
        response.metadata.query_type = Some(classification.query_type);
        response
    }

    async fn execute(&self, sql: &str) -> Result<Vec<Row>, ResponseEnvelope> {
        match self.executor.execute(sql).await {
            Ok(rows) => {
                debug!(rows = rows.len(), "query returned");
                Ok(rows)
            }
            Err(e) => {
                error!(error = %e, sql = %sql, "query failed");
                let mut response = format::execution_error();
                response.metadata.sql_query = sql.to_string();
                Err(response)
            }
        }
    }

    async fn add_explanation(&self, response: &mut ResponseEnvelope, question: &str, rows: &[Row]) {
        let Some(completion) = &self.explainer else {
            return;
        };
        let total = response.metadata.total_results;
        if let Some(text) =
            explain::explain(completion.as_ref(), question, rows, total, self.explain_timeout).await
        {
            let at = response.results.len().min(1);
            response.results.insert(at, ResultItem::text(text));
        }
    }
}
