//! Deterministic extractors for the first classification tier.
//!
//! Each extractor is a pure function of the (lowercased) question and returns
//! what it found together with a confidence reflecting how specific the match
//! was. Compiled patterns are process-wide statics, built on first use and
//! shared read-only afterwards.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use dziwani_core::query::{year_end, year_start};
use dziwani_core::vocab::{
    DISTRICT_VARIATIONS, DISTRICTS, SECTOR_SYNONYMS, SECTORS, STATUS_SYNONYMS, STATUSES,
};
use dziwani_core::{
    Aggregate, AggregateFunction, BudgetRange, GroupBy, MatchKind, Normalizer, TimeRange,
};
use regex::{Captures, Regex};

/// A value found in the text, with the extractor's confidence in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub value: T,
    pub confidence: f32,
}

impl<T> Scored<T> {
    fn new(value: T, confidence: f32) -> Self {
        Self { value, confidence }
    }
}

// ── Confidence levels ──

const CODE_CONFIDENCE: f32 = 0.95;
const QUOTED_NAME_CONFIDENCE: f32 = 0.9;
const UNQUOTED_NAME_CONFIDENCE: f32 = 0.8;
const DISTRICT_KEYWORD_CONFIDENCE: f32 = 0.9;
const DISTRICT_CONFIDENCE: f32 = 0.8;
const FUZZY_DISTRICT_WEIGHT: f32 = 0.7;
const SECTOR_KEYWORD_CONFIDENCE: f32 = 0.9;
const SECTOR_CONFIDENCE: f32 = 0.8;
const SECTOR_SYNONYM_CONFIDENCE: f32 = 0.75;
const STATUS_KEYWORD_CONFIDENCE: f32 = 0.9;
const STATUS_CONFIDENCE: f32 = 0.7;
const RANGE_CONFIDENCE: f32 = 0.9;
const BOUND_CONFIDENCE: f32 = 0.85;

// ── Conversational ──

/// Short greetings such as "hi", "good morning", "hello there!".
pub fn is_greeting(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    word_count(&lower) <= 4 && GREETING.is_match(&lower) && !mentions_domain(&lower)
}

/// Chatter with no bearing on the project catalog.
pub fn is_unrelated(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return true;
    }
    if mentions_domain(&lower) {
        return false;
    }
    OFF_TOPIC.is_match(&lower) || (word_count(&lower) <= 3 && !DETAILS_PHRASE.is_match(&lower))
}

/// Whether the text names anything the catalog knows about.
pub fn mentions_domain(lower: &str) -> bool {
    DOMAIN_WORDS.is_match(lower)
        || PROJECT_CODE.is_match(lower)
        || DISTRICTS
            .iter()
            .any(|d| contains_phrase(lower, &d.to_lowercase()))
        || DISTRICT_VARIATIONS
            .iter()
            .any(|(v, _)| contains_phrase(lower, v))
        || SECTORS.iter().any(|s| contains_phrase(lower, s))
        || SECTOR_SYNONYMS.iter().any(|(s, _)| contains_phrase(lower, s))
        || STATUSES.iter().any(|s| contains_phrase(lower, s))
}

// ── Project identifier ──

/// A project code (`MW-CR-DO`) anywhere in the text, or a project name after
/// a details phrase such as "tell me about".
pub fn extract_project_identifier(text: &str, normalizer: &Normalizer) -> Option<Scored<String>> {
    if let Some(m) = PROJECT_CODE.find(text) {
        return Some(Scored::new(m.as_str().to_uppercase(), CODE_CONFIDENCE));
    }

    let caps = DETAILS_PHRASE.captures(text)?;
    let rest = caps.name("rest")?.as_str().trim();

    if let Some(q) = QUOTED.captures(rest) {
        let name = q.name("name")?.as_str().trim();
        return (!name.is_empty())
            .then(|| Scored::new(name.to_string(), QUOTED_NAME_CONFIDENCE));
    }

    let name = strip_name(rest);
    let lower = name.to_lowercase();
    if name.is_empty()
        || LISTING_WORDS.is_match(&lower)
        || normalizer.match_district(&lower).is_some_and(|m| m.kind != MatchKind::Fuzzy)
        || normalizer.match_sector(&lower).is_some_and(|m| m.kind != MatchKind::Fuzzy)
    {
        return None;
    }
    Some(Scored::new(name.to_string(), UNQUOTED_NAME_CONFIDENCE))
}

/// Trim punctuation, a leading article, and a trailing "project".
fn strip_name(rest: &str) -> &str {
    let name = rest.trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
    let name = strip_prefix_ci(name, "the ").unwrap_or(name);
    let name = strip_suffix_ci(name, " project").unwrap_or(name);
    name.trim()
}

// ── Districts ──

/// Districts named in the text, by exact name, known variation, or fuzzy
/// match of an "in X" / "X district" phrase.
pub fn extract_districts(
    lower: &str,
    normalizer: &Normalizer,
) -> Option<Scored<BTreeSet<&'static str>>> {
    let mut found = BTreeSet::new();

    for district in DISTRICTS {
        if contains_phrase(lower, &district.to_lowercase()) {
            found.insert(*district);
        }
    }
    for (variation, district) in DISTRICT_VARIATIONS {
        if contains_phrase(lower, variation) {
            found.insert(*district);
        }
    }

    if !found.is_empty() {
        let confidence = if DISTRICT_KEYWORD.is_match(lower) {
            DISTRICT_KEYWORD_CONFIDENCE
        } else {
            DISTRICT_CONFIDENCE
        };
        return Some(Scored::new(found, confidence));
    }

    let mut best_ratio = 0.0f64;
    for phrase in district_candidates(lower) {
        if let Some(m) = normalizer.match_district(&phrase) {
            found.insert(m.value);
            best_ratio = best_ratio.max(m.score);
        }
    }

    (!found.is_empty()).then(|| Scored::new(found, FUZZY_DISTRICT_WEIGHT * best_ratio as f32))
}

/// Phrases that sit where a district name would: after "in"/"at"/"from",
/// or before "district". Each capture yields the whole phrase plus its
/// individual words.
fn district_candidates(lower: &str) -> Vec<String> {
    let mut out = Vec::new();
    for re in [&*PLACE_AFTER_PREPOSITION, &*PLACE_BEFORE_DISTRICT] {
        for caps in re.captures_iter(lower) {
            let Some(phrase) = caps.name("place") else {
                continue;
            };
            let words: Vec<&str> = phrase
                .as_str()
                .split_whitespace()
                .filter(|w| !STOPWORDS.contains(w))
                .collect();
            if words.is_empty() {
                continue;
            }
            out.push(words.join(" "));
            if words.len() > 1 {
                out.extend(words.iter().map(|w| w.to_string()));
            }
        }
    }
    out
}

// ── Sectors ──

/// Sectors named directly or implied by a synonym ("clinic" → health).
pub fn extract_sectors(lower: &str) -> Option<Scored<BTreeSet<&'static str>>> {
    let mut found = BTreeSet::new();
    let mut direct = false;

    for sector in SECTORS {
        if contains_phrase(lower, sector) {
            found.insert(*sector);
            direct = true;
        }
    }
    for (synonym, sector) in SECTOR_SYNONYMS {
        if contains_phrase(lower, synonym) {
            found.insert(*sector);
        }
    }

    if found.is_empty() {
        return None;
    }
    let confidence = match (direct, SECTOR_KEYWORD.is_match(lower)) {
        (true, true) => SECTOR_KEYWORD_CONFIDENCE,
        (true, false) => SECTOR_CONFIDENCE,
        (false, _) => SECTOR_SYNONYM_CONFIDENCE,
    };
    Some(Scored::new(found, confidence))
}

// ── Statuses ──

/// Statuses named directly or through informal phrasing ("in progress").
pub fn extract_statuses(lower: &str) -> Option<Scored<BTreeSet<&'static str>>> {
    let mut found = BTreeSet::new();
    for status in STATUSES {
        if contains_phrase(lower, status) {
            found.insert(*status);
        }
    }
    for (phrase, status) in STATUS_SYNONYMS {
        if contains_phrase(lower, phrase) {
            found.insert(*status);
        }
    }

    if found.is_empty() {
        return None;
    }
    let confidence = if PROJECT_WORD.is_match(lower) {
        STATUS_KEYWORD_CONFIDENCE
    } else {
        STATUS_CONFIDENCE
    };
    Some(Scored::new(found, confidence))
}

// ── Budget ──

/// Budget bounds from "over 5 million", "under K500,000", "between 1m and 3m".
///
/// Bare four-digit numbers that look like years are left to
/// [`extract_time`].
pub fn extract_budget(lower: &str) -> Option<Scored<BudgetRange>> {
    if let Some(caps) = BUDGET_BETWEEN.captures(lower) {
        let a = amount(&caps, "1");
        let b = amount(&caps, "2");
        if let (Some(a), Some(b)) = (a, b) {
            if !(a.year_like && b.year_like) {
                return Some(Scored::new(
                    BudgetRange::new(Some(a.value), Some(b.value)),
                    RANGE_CONFIDENCE,
                ));
            }
        }
    }

    let min = BUDGET_MIN
        .captures(lower)
        .and_then(|c| amount(&c, "1"))
        .filter(|a| !a.year_like);
    let max = BUDGET_MAX
        .captures(lower)
        .and_then(|c| amount(&c, "1"))
        .filter(|a| !a.year_like);

    match (min, max) {
        (None, None) => None,
        (min, max) => {
            let both = min.is_some() && max.is_some();
            Some(Scored::new(
                BudgetRange::new(min.map(|a| a.value), max.map(|a| a.value)),
                if both { RANGE_CONFIDENCE } else { BOUND_CONFIDENCE },
            ))
        }
    }
}

struct Amount {
    value: f64,
    year_like: bool,
}

fn amount(caps: &Captures<'_>, n: &str) -> Option<Amount> {
    let digits = caps.name(&format!("num{n}"))?.as_str();
    let currency = caps.name(&format!("cur{n}")).is_some();
    let multiplier = caps.name(&format!("mul{n}")).map(|m| m.as_str());
    let value = parse_amount(digits, multiplier)?;
    let year_like = !currency
        && multiplier.is_none()
        && digits.len() == 4
        && digits.chars().all(|c| c.is_ascii_digit())
        && (1900.0..=2100.0).contains(&value);
    Some(Amount { value, year_like })
}

/// Parse "1,500,000" or "2.5" with an optional "million"/"k"-style suffix.
pub fn parse_amount(digits: &str, multiplier: Option<&str>) -> Option<f64> {
    let base: f64 = digits.replace(',', "").parse().ok()?;
    let factor = match multiplier {
        Some("billion" | "bn") => 1_000_000_000.0,
        Some("million" | "mn" | "m") => 1_000_000.0,
        Some("thousand" | "k") => 1_000.0,
        _ => 1.0,
    };
    Some(base * factor)
}

// ── Time ──

/// Date bounds from "in 2023", "between 2020 and 2022", "since 2021",
/// "before 2019".
pub fn extract_time(lower: &str) -> Option<Scored<TimeRange>> {
    if let Some(caps) = YEAR_RANGE
        .captures(lower)
        .or_else(|| YEAR_SPAN.captures(lower))
    {
        let a = year(&caps, "a")?;
        let b = year(&caps, "b")?;
        return Some(Scored::new(
            TimeRange::new(year_start(a), year_end(b)),
            RANGE_CONFIDENCE,
        ));
    }

    let start = YEAR_AFTER.captures(lower).and_then(|c| {
        let y = year(&c, "a")?;
        match c.name("kw")?.as_str() {
            "after" => year_start(y + 1),
            _ => year_start(y),
        }
    });
    let end = YEAR_BEFORE.captures(lower).and_then(|c| {
        let y = year(&c, "a")?;
        match c.name("kw")?.as_str() {
            "before" | "prior to" => year_end(y - 1),
            _ => year_end(y),
        }
    });
    if start.is_some() || end.is_some() {
        let confidence = if start.is_some() && end.is_some() {
            RANGE_CONFIDENCE
        } else {
            BOUND_CONFIDENCE
        };
        return Some(Scored::new(TimeRange::new(start, end), confidence));
    }

    let caps = YEAR_IN.captures(lower)?;
    let y = year(&caps, "a")?;
    Some(Scored::new(TimeRange::year(y), BOUND_CONFIDENCE))
}

fn year(caps: &Captures<'_>, name: &str) -> Option<i32> {
    caps.name(name)?.as_str().parse().ok()
}

/// Parse a year ("2023") or ISO date ("2023-05-01").
pub fn parse_date_bound(text: &str, end_of_year: bool) -> Option<NaiveDate> {
    let text = text.trim();
    if text.len() == 4 {
        let y: i32 = text.parse().ok()?;
        return if end_of_year { year_end(y) } else { year_start(y) };
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

// ── Aggregates ──

/// Detect a request for counts, totals, or averages, and how to group them.
///
/// `district_count` is the number of districts named in the question;
/// comparing several districts groups by district.
pub fn detect_aggregate(lower: &str, district_count: usize) -> Option<Aggregate> {
    if !AGGREGATE_WORDS.is_match(lower) {
        return None;
    }

    let function = if COUNT_WORDS.is_match(lower) {
        AggregateFunction::Count
    } else if AVERAGE_WORDS.is_match(lower) {
        AggregateFunction::Average
    } else {
        AggregateFunction::Sum
    };

    let group_by = GROUPING
        .captures(lower)
        .and_then(|c| c.name("col"))
        .and_then(|m| match m.as_str() {
            "district" | "region" => Some(GroupBy::District),
            "sector" => Some(GroupBy::Sector),
            "status" => Some(GroupBy::Status),
            "year" | "fiscal year" => Some(GroupBy::FiscalYear),
            _ => None,
        })
        .or_else(|| {
            if contains_phrase(lower, "compare") {
                Some(if district_count > 1 {
                    GroupBy::District
                } else {
                    GroupBy::Sector
                })
            } else if contains_phrase(lower, "breakdown") || contains_phrase(lower, "distribution")
            {
                Some(if DISTRICT_KEYWORD.is_match(lower) {
                    GroupBy::District
                } else {
                    GroupBy::Sector
                })
            } else {
                None
            }
        });

    Some(Aggregate { function, group_by })
}

// ── Text helpers ──

/// Whole-word (or whole-phrase) containment.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    haystack.match_indices(phrase).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let start = s.len().checked_sub(suffix.len())?;
    let tail = s.get(start..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &s[..start])
}

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "all", "any", "my", "our", "this", "that", "these", "those", "projects",
    "project", "district", "districts", "area", "region", "malawi", "and", "or", "of",
];

// ── Patterns ──

const AMOUNT_1: &str = r"(?P<cur1>mwk|mk|k)?\s*(?P<num1>\d[\d,]*(?:\.\d+)?)\s*(?P<mul1>billion|bn|million|mn|m|thousand|k)?\b";
const AMOUNT_2: &str = r"(?P<cur2>mwk|mk|k)?\s*(?P<num2>\d[\d,]*(?:\.\d+)?)\s*(?P<mul2>billion|bn|million|mn|m|thousand|k)?\b";

static PROJECT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bMW-[A-Z]{2}-[A-Z0-9]{2}\b").expect("Invalid regex"));
static DETAILS_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:tell\s+me\s+(?:more\s+)?about|(?:show\s+(?:me\s+)?(?:the\s+)?)?details\s+(?:of|for|on|about)|more\s+information\s+(?:about|on)|information\s+(?:about|on))\s+(?P<rest>.+)$",
    )
    .expect("Invalid regex")
});
static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^["'“‘](?P<name>[^"'”’]+)["'”’]"#).expect("Invalid regex")
});
static LISTING_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\bprojects\b|^(?:all|any|every|some)\b)").expect("Invalid regex")
});
static GREETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:hi|hello|hey|hiya|howdy|greetings|good\s+(?:morning|afternoon|evening)|how\s+are\s+you|muli\s+bwanji|moni)\b",
    )
    .expect("Invalid regex")
});
static OFF_TOPIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:weather|jokes?|news|sports?|football|recipes?|movies?|music|who\s+are\s+you|what\s+is\s+your\s+name)\b",
    )
    .expect("Invalid regex")
});
static DOMAIN_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:projects?|budgets?|districts?|sectors?|status|contractors?|funding|funded|expenditure|construction|regions?|malawi|spent|cost|how\s+many|count|total|list|show)\b",
    )
    .expect("Invalid regex")
});
static DISTRICT_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdistricts?\b").expect("Invalid regex"));
static SECTOR_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:sectors?|projects)\b").expect("Invalid regex"));
static PROJECT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bprojects?\b").expect("Invalid regex"));
static PLACE_AFTER_PREPOSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:in|at|from|within|around)\s+(?P<place>[a-z][a-z\-]+(?:\s+[a-z][a-z\-]+)?)")
        .expect("Invalid regex")
});
static PLACE_BEFORE_DISTRICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<place>[a-z][a-z\-]+(?:\s+[a-z][a-z\-]+)?)\s+district\b")
        .expect("Invalid regex")
});
static BUDGET_BETWEEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?:between|from)\s+{AMOUNT_1}\s*(?:and|to|-)\s*{AMOUNT_2}"
    ))
    .expect("Invalid regex")
});
static BUDGET_MIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?:more\s+than|over|above|greater\s+than|at\s+least|exceeding|exceeds)\s+{AMOUNT_1}"
    ))
    .expect("Invalid regex")
});
static BUDGET_MAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?:less\s+than|under|below|at\s+most|up\s+to|cheaper\s+than)\s+{AMOUNT_1}"
    ))
    .expect("Invalid regex")
});
static YEAR_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:between|from)\s+(?P<a>(?:19|20)\d{2})\s*(?:and|to|until|-)\s*(?P<b>(?:19|20)\d{2})\b",
    )
    .expect("Invalid regex")
});
static YEAR_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<a>(?:19|20)\d{2})\s*-\s*(?P<b>(?:19|20)\d{2})\b").expect("Invalid regex")
});
static YEAR_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<kw>after|since|from)\s+(?P<a>(?:19|20)\d{2})\b").expect("Invalid regex")
});
static YEAR_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<kw>before|until|till|up\s+to|prior\s+to)\s+(?P<a>(?:19|20)\d{2})\b")
        .expect("Invalid regex")
});
static YEAR_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:in|during|for)\s+(?:the\s+)?(?:year\s+)?(?P<a>(?:19|20)\d{2})\b")
        .expect("Invalid regex")
});
static AGGREGATE_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:count|how\s+many|number\s+of|total|sum|average|avg|mean|breakdown|group\s+by|statistics|summary|distribution|percentage|proportion|compare)\b",
    )
    .expect("Invalid regex")
});
static COUNT_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:count|how\s+many|number\s+of)\b").expect("Invalid regex")
});
static AVERAGE_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:average|avg|mean)\b").expect("Invalid regex"));
static GROUPING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:by|per|across|for\s+each|each|group\s+by)\s+(?P<col>fiscal\s+year|district|region|sector|status|year)s?\b",
    )
    .expect("Invalid regex")
});
