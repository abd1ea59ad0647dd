//! Entity normalization for districts, sectors, and statuses.
//!
//! Raw fragments of user text are mapped onto the closed vocabularies in
//! [`crate::vocab`]. Each lookup runs the same ladder:
//!
//! 1. Exact (case-insensitive) match against the vocabulary
//! 2. Variation / synonym table (`"nkhatabay"` → Nkhata Bay, `"clinic"` → health)
//! 3. Fuzzy match by normalized Levenshtein ratio, accepted at or above the
//!    threshold (default 0.75). The highest ratio wins. Equal ratios keep the
//!    entry that appears first in the vocabulary.
//!
//! Input that matches nothing comes back unmodified as
//! [`Normalized::Unmatched`], so callers decide whether an unknown entity is
//! an error, a filter to drop, or a search term.

use tracing::trace;

use crate::vocab::{
    DISTRICT_VARIATIONS, DISTRICTS, SECTOR_SYNONYMS, SECTORS, STATUS_SYNONYMS, STATUSES,
};

/// Minimum similarity ratio for fuzzy matches.
pub const DEFAULT_MATCH_RATIO: f64 = 0.75;

/// How an entity was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Vocabulary entry, ignoring case.
    Exact,
    /// Listed variation or synonym.
    Synonym,
    /// Similarity ratio at or above the threshold.
    Fuzzy,
}

/// A vocabulary entry matched from raw text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityMatch {
    pub value: &'static str,
    pub kind: MatchKind,
    /// 1.0 for exact and synonym matches, the similarity ratio for fuzzy ones.
    pub score: f64,
}

/// Result of normalizing a text fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized<'a> {
    Canonical(&'static str),
    Unmatched(&'a str),
}

impl<'a> Normalized<'a> {
    /// The canonical value, if the input matched.
    pub fn canonical(&self) -> Option<&'static str> {
        match *self {
            Self::Canonical(v) => Some(v),
            Self::Unmatched(_) => None,
        }
    }

    /// The canonical value, or the original input when nothing matched.
    pub fn as_str(&self) -> &'a str {
        match *self {
            Self::Canonical(v) => v,
            Self::Unmatched(raw) => raw,
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, Self::Canonical(_))
    }
}

/// Vocabulary matcher with a configurable fuzzy threshold.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    min_ratio: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_RATIO)
    }
}

impl Normalizer {
    /// Create a normalizer accepting fuzzy matches at or above `min_ratio`.
    ///
    /// The ratio is clamped to `[0.0, 1.0]`.
    pub fn new(min_ratio: f64) -> Self {
        Self {
            min_ratio: min_ratio.clamp(0.0, 1.0),
        }
    }

    pub fn min_ratio(&self) -> f64 {
        self.min_ratio
    }

    pub fn district<'a>(&self, text: &'a str) -> Normalized<'a> {
        wrap(text, self.match_district(text))
    }

    pub fn sector<'a>(&self, text: &'a str) -> Normalized<'a> {
        wrap(text, self.match_sector(text))
    }

    pub fn status<'a>(&self, text: &'a str) -> Normalized<'a> {
        wrap(text, self.match_status(text))
    }

    /// Match a district name. A trailing "district" is ignored.
    pub fn match_district(&self, text: &str) -> Option<EntityMatch> {
        let cleaned = clean(text);
        let cleaned = cleaned
            .strip_suffix(" district")
            .map(str::trim_end)
            .unwrap_or(&cleaned);
        self.lookup(cleaned, DISTRICTS, DISTRICT_VARIATIONS)
    }

    /// Match a sector label. A trailing "sector" is ignored.
    pub fn match_sector(&self, text: &str) -> Option<EntityMatch> {
        let cleaned = clean(text);
        let cleaned = cleaned
            .strip_suffix(" sector")
            .map(str::trim_end)
            .unwrap_or(&cleaned);
        self.lookup(cleaned, SECTORS, SECTOR_SYNONYMS)
    }

    /// Match a project status.
    pub fn match_status(&self, text: &str) -> Option<EntityMatch> {
        let cleaned = clean(text);
        self.lookup(&cleaned, STATUSES, STATUS_SYNONYMS)
    }

    fn lookup(
        &self,
        cleaned: &str,
        vocabulary: &[&'static str],
        aliases: &[(&str, &'static str)],
    ) -> Option<EntityMatch> {
        if cleaned.is_empty() {
            return None;
        }

        if let Some(value) = vocabulary
            .iter()
            .copied()
            .find(|v| v.eq_ignore_ascii_case(cleaned))
        {
            return Some(EntityMatch {
                value,
                kind: MatchKind::Exact,
                score: 1.0,
            });
        }

        if let Some(value) = aliases
            .iter()
            .find(|(alias, _)| *alias == cleaned)
            .map(|&(_, value)| value)
        {
            return Some(EntityMatch {
                value,
                kind: MatchKind::Synonym,
                score: 1.0,
            });
        }

        let (value, score) = best_ratio(cleaned, vocabulary)?;
        if score >= self.min_ratio {
            trace!(input = cleaned, value, score, "fuzzy entity match");
            Some(EntityMatch {
                value,
                kind: MatchKind::Fuzzy,
                score,
            })
        } else {
            None
        }
    }
}

/// Canonical district for `text` using the default threshold.
pub fn normalize_district(text: &str) -> Normalized<'_> {
    Normalizer::default().district(text)
}

/// Canonical sector for `text` using the default threshold.
pub fn normalize_sector(text: &str) -> Normalized<'_> {
    Normalizer::default().sector(text)
}

/// Canonical status for `text` using the default threshold.
pub fn normalize_status(text: &str) -> Normalized<'_> {
    Normalizer::default().status(text)
}

fn wrap(text: &str, found: Option<EntityMatch>) -> Normalized<'_> {
    match found {
        Some(m) => Normalized::Canonical(m.value),
        None => Normalized::Unmatched(text),
    }
}

/// Lowercase, collapse whitespace, and drop surrounding punctuation.
fn clean(text: &str) -> String {
    text.trim_matches(|c: char| !c.is_alphanumeric())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Highest-ratio vocabulary entry. Only a strictly greater ratio replaces the
/// current best, so ties resolve to vocabulary order.
fn best_ratio(input: &str, vocabulary: &[&'static str]) -> Option<(&'static str, f64)> {
    let mut best: Option<(&'static str, f64)> = None;
    for &candidate in vocabulary {
        let ratio = strsim::normalized_levenshtein(input, &candidate.to_lowercase());
        match best {
            Some((_, top)) if ratio <= top => {}
            _ => best = Some((candidate, ratio)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_district_any_case() {
        assert_eq!(normalize_district("zomba"), Normalized::Canonical("Zomba"));
        assert_eq!(normalize_district("ZOMBA"), Normalized::Canonical("Zomba"));
        assert_eq!(
            normalize_district("  nkhata bay "),
            Normalized::Canonical("Nkhata Bay")
        );
    }

    #[test]
    fn district_suffix_ignored() {
        assert_eq!(
            normalize_district("Zomba district"),
            Normalized::Canonical("Zomba")
        );
    }

    #[test]
    fn variation_table_hits() {
        assert_eq!(
            normalize_district("Nkhatabay"),
            Normalized::Canonical("Nkhata Bay")
        );
        assert_eq!(normalize_district("Mzuzu"), Normalized::Canonical("Mzimba"));
        assert_eq!(
            normalize_district("zomba city"),
            Normalized::Canonical("Zomba")
        );
        let m = Normalizer::default().match_district("blantire").unwrap();
        assert_eq!(m.kind, MatchKind::Synonym);
    }

    #[test]
    fn fuzzy_district_typo() {
        let m = Normalizer::default().match_district("Lilongwee").unwrap();
        assert_eq!(m.value, "Lilongwe");
        assert_eq!(m.kind, MatchKind::Fuzzy);
        assert!(m.score >= DEFAULT_MATCH_RATIO);

        assert_eq!(
            normalize_district("Kasunga"),
            Normalized::Canonical("Kasungu")
        );
    }

    #[test]
    fn unmatched_returned_unmodified() {
        assert_eq!(
            normalize_district("Atlantis"),
            Normalized::Unmatched("Atlantis")
        );
        assert_eq!(normalize_district("Atlantis").as_str(), "Atlantis");
        assert!(normalize_district("").canonical().is_none());
    }

    #[test]
    fn stricter_threshold_rejects_typo() {
        let strict = Normalizer::new(0.95);
        assert!(strict.match_district("Lilongwee").is_none());
        assert_eq!(strict.district("Lilongwee"), Normalized::Unmatched("Lilongwee"));
    }

    #[test]
    fn ties_resolve_to_vocabulary_order() {
        // "q" shares no letter with any district, so every ratio is 0.0.
        let n = Normalizer::new(0.0);
        let m = n.match_district("q").unwrap();
        assert_eq!(m.value, "Balaka");
        assert_eq!(m.score, 0.0);
    }

    #[test]
    fn closer_candidate_beats_earlier_one() {
        let n = Normalizer::new(0.0);
        assert_eq!(n.match_district("ntchis").unwrap().value, "Ntchisi");
    }

    #[test]
    fn district_normalization_idempotent() {
        let inputs = DISTRICTS
            .iter()
            .copied()
            .chain(DISTRICT_VARIATIONS.iter().map(|(v, _)| *v))
            .chain(["Lilongwee", "zomba district", "Atlantis", "Kasunga"]);
        for input in inputs {
            let once = normalize_district(input);
            let twice = normalize_district(once.as_str());
            assert_eq!(once.as_str(), twice.as_str(), "not idempotent for {input}");
        }
    }

    #[test]
    fn sector_synonyms_before_fuzzy() {
        assert_eq!(normalize_sector("hospital"), Normalized::Canonical("health"));
        assert_eq!(normalize_sector("Clinic"), Normalized::Canonical("health"));
        assert_eq!(normalize_sector("roads"), Normalized::Canonical("transport"));
        assert_eq!(
            normalize_sector("Education sector"),
            Normalized::Canonical("education")
        );
        let m = Normalizer::default().match_sector("school").unwrap();
        assert_eq!(m.kind, MatchKind::Synonym);
    }

    #[test]
    fn sector_fuzzy_typo() {
        assert_eq!(normalize_sector("educaton"), Normalized::Canonical("education"));
        assert_eq!(normalize_sector("banking"), Normalized::Unmatched("banking"));
    }

    #[test]
    fn status_synonyms() {
        assert_eq!(normalize_status("in progress"), Normalized::Canonical("ongoing"));
        assert_eq!(normalize_status("In-Progress"), Normalized::Canonical("ongoing"));
        assert_eq!(normalize_status("finished"), Normalized::Canonical("completed"));
        assert_eq!(normalize_status("behind schedule"), Normalized::Canonical("delayed"));
        assert_eq!(normalize_status("halted"), Normalized::Canonical("suspended"));
        assert_eq!(normalize_status("Completed"), Normalized::Canonical("completed"));
    }

    #[test]
    fn status_idempotent() {
        for s in STATUSES.iter().chain(STATUS_SYNONYMS.iter().map(|(k, _)| k)) {
            let once = normalize_status(s);
            assert!(once.is_canonical(), "{s} did not normalize");
            assert_eq!(normalize_status(once.as_str()), once);
        }
    }
}
