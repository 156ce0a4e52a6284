//! Entity matcher: free-text term to vocabulary code
//!
//! Tiers, first hit wins:
//! 1. exact primary name (1.0)
//! 2. exact alias (0.9)
//! 3. substring in either direction against primary name or alias (0.7)
//!
//! No hit means no match. The fuzzy tier applies the same confidence to a
//! one-character difference and to a long phrase that happens to contain a
//! short name; there is no edit-distance grading.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::normalize::{normalize_term, normalize_year};
use super::{EntityMapping, EntityType, Vocabulary};

pub const EXACT_CONFIDENCE: f64 = 1.0;
pub const ALIAS_CONFIDENCE: f64 = 0.9;
pub const FUZZY_CONFIDENCE: f64 = 0.7;

/// Matches below this confidence go through confirmation
pub const CONFIRMATION_THRESHOLD: f64 = ALIAS_CONFIDENCE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Alias,
    Fuzzy,
}

impl MatchType {
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Exact => EXACT_CONFIDENCE,
            Self::Alias => ALIAS_CONFIDENCE,
            Self::Fuzzy => FUZZY_CONFIDENCE,
        }
    }
}

/// A term resolved to a vocabulary record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMatch {
    pub entity_type: EntityType,
    pub code: String,
    pub matched_term: String,
    pub primary_name: String,
    pub category: String,
    pub confidence: f64,
    pub match_type: MatchType,
}

impl ResolvedMatch {
    fn new(entity_type: EntityType, term: &str, entry: &EntityMapping, match_type: MatchType) -> Self {
        Self {
            entity_type,
            code: entry.code.clone(),
            matched_term: term.to_string(),
            primary_name: entry.primary_name.clone(),
            category: entry.category.clone(),
            confidence: match_type.confidence(),
            match_type,
        }
    }

    /// Decided by the match tier, not the serialized `confidence`
    pub fn needs_confirmation(&self) -> bool {
        self.match_type.confidence() < CONFIRMATION_THRESHOLD
    }
}

/// Read-only matcher over a shared vocabulary
#[derive(Debug, Clone)]
pub struct EntityMatcher {
    vocabulary: Arc<Vocabulary>,
}

impl EntityMatcher {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Best match for `term` among entries of `entity_type`
    pub fn resolve(&self, term: &str, entity_type: EntityType) -> Option<ResolvedMatch> {
        let needle = normalize_term(term);
        if needle.is_empty() {
            return None;
        }
        let entries = self.vocabulary.entries(entity_type);

        if let Some(entry) = entries
            .iter()
            .find(|e| normalize_term(&e.primary_name) == needle)
        {
            return Some(ResolvedMatch::new(entity_type, term, entry, MatchType::Exact));
        }

        if let Some(entry) = entries
            .iter()
            .find(|e| e.aliases.iter().any(|a| normalize_term(a) == needle))
        {
            return Some(ResolvedMatch::new(entity_type, term, entry, MatchType::Alias));
        }

        entries
            .iter()
            .find(|e| {
                std::iter::once(&e.primary_name)
                    .chain(e.aliases.iter())
                    .map(|name| normalize_term(name))
                    .any(|name| !name.is_empty() && (name.contains(&needle) || needle.contains(&name)))
            })
            .map(|entry| ResolvedMatch::new(entity_type, term, entry, MatchType::Fuzzy))
    }

    /// Resolve each term independently; unmatched terms are skipped
    pub fn resolve_all(&self, terms: &[String], entity_type: EntityType) -> Vec<ResolvedMatch> {
        terms
            .iter()
            .filter_map(|term| {
                let resolved = self.resolve(term, entity_type);
                match &resolved {
                    Some(m) if m.match_type == MatchType::Fuzzy => tracing::warn!(
                        term = %term,
                        code = %m.code,
                        entity_type = %entity_type,
                        "Fuzzy match needs confirmation"
                    ),
                    Some(m) => tracing::debug!(term = %term, code = %m.code, match_type = ?m.match_type, "Term resolved"),
                    None => tracing::debug!(term = %term, entity_type = %entity_type, "Term unresolved"),
                }
                resolved
            })
            .collect()
    }

    /// Four-digit years from free-text year terms, deduplicated in order
    pub fn resolve_years(&self, terms: &[String]) -> Vec<String> {
        let mut years: Vec<String> = Vec::new();
        for year in terms.iter().filter_map(|t| normalize_year(t)) {
            if !years.contains(&year) {
                years.push(year);
            }
        }
        years
    }
}
