//! Hard safety checks on generated SQL and on raw user input.
//!
//! Generated statements are validated in full before they leave the builder;
//! a violation means no statement at all. Raw questions are screened before
//! classification so injection attempts never reach the pipeline.

use std::sync::LazyLock;

use dziwani_core::dashboard;
use regex::Regex;
use thiserror::Error;

/// Data-mutation and administrative keywords. Rejected anywhere in the
/// statement, string literals included.
pub const MUTATION_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "TRUNCATE", "GRANT", "EXEC",
];

/// Engine-level keywords. Rejected outside string literals only, since
/// project names such as "Mchinji Call Centre" contain them.
pub const STATEMENT_KEYWORDS: &[&str] = &[
    "UNION", "ATTACH", "DETACH", "COPY", "PRAGMA", "INSTALL", "LOAD", "CREATE", "REPLACE", "CALL",
    "SET",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyViolation {
    #[error("empty statement")]
    Empty,
    #[error("statement does not start with SELECT")]
    NotSelect,
    #[error("forbidden keyword {0}")]
    ForbiddenKeyword(String),
    #[error("stacked statements")]
    StackedStatement,
    #[error("inline comment")]
    Comment,
    #[error("reference to unknown table {0}")]
    UnknownTable(String),
}

/// Check a complete statement. Comment and mutation-keyword checks run over
/// the full text, string literals included.
pub fn validate_sql(sql: &str) -> Result<(), SafetyViolation> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(SafetyViolation::Empty);
    }
    if !SELECT_PREFIX.is_match(trimmed) {
        return Err(SafetyViolation::NotSelect);
    }
    if trimmed.contains("--") || trimmed.contains("/*") || trimmed.contains("*/") {
        return Err(SafetyViolation::Comment);
    }
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    if body.contains(';') {
        return Err(SafetyViolation::StackedStatement);
    }
    if let Some(m) = MUTATION.find(trimmed) {
        return Err(SafetyViolation::ForbiddenKeyword(m.as_str().to_uppercase()));
    }

    let without_literals = STRING_LITERAL.replace_all(trimmed, "''");
    if let Some(m) = STATEMENT.find(&without_literals) {
        return Err(SafetyViolation::ForbiddenKeyword(m.as_str().to_uppercase()));
    }
    for caps in TABLE_REFERENCE.captures_iter(&without_literals) {
        let table = &caps[1];
        if !table.eq_ignore_ascii_case(dashboard::TABLE) {
            return Err(SafetyViolation::UnknownTable(table.to_string()));
        }
    }
    Ok(())
}

/// Whether a raw question looks like an injection attempt.
pub fn looks_like_injection(text: &str) -> bool {
    INJECTION.is_match(text)
}

static SELECT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^SELECT\b").expect("Invalid regex"));
static MUTATION: LazyLock<Regex> = LazyLock::new(|| keyword_pattern(MUTATION_KEYWORDS));
static STATEMENT: LazyLock<Regex> = LazyLock::new(|| keyword_pattern(STATEMENT_KEYWORDS));
static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(?:[^']|'')*'").expect("Invalid regex"));
static TABLE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:FROM|JOIN)\s+([A-Za-z_][A-Za-z0-9_.]*)").expect("Invalid regex")
});
static INJECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:'\s*;|--|/\*|\bunion\s+(?:all\s+)?select\b|;\s*(?:drop|delete|update|insert|alter|truncate|grant|exec|create|attach|copy|pragma)\b)",
    )
    .expect("Invalid regex")
});

fn keyword_pattern(keywords: &[&str]) -> Regex {
    Regex::new(&format!(r"(?i)\b(?:{})\b", keywords.join("|"))).expect("Invalid regex")
}
