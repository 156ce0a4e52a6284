//! Confirmation of tentative entity matches
//!
//! Entered only when some resolved match is below
//! [`CONFIRMATION_THRESHOLD`](crate::vocabulary::matcher::CONFIRMATION_THRESHOLD).
//! Every tentative match needs an explicit decision; a match without one is
//! dropped. Matches at or above the threshold pass through untouched.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::ai::{complete_within, parse_llm_json_object, CompletionRequest, LlmClient, OraclePurpose};
use crate::error::{PipelineError, PipelineResult};
use crate::planner::{prompts, ResolvedEntities};
use crate::vocabulary::ResolvedMatch;

/// Who decides on tentative matches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    /// Ask the oracle and continue in the same run
    #[default]
    Oracle,
    /// Stop in `AwaitingConfirmation` and let the caller resume
    Caller,
}

impl FromStr for ConfirmationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oracle" | "llm" => Ok(Self::Oracle),
            "caller" | "user" => Ok(Self::Caller),
            other => Err(format!("unknown confirmation mode '{}'", other)),
        }
    }
}

/// Confirm or reject one tentative match, identified by code and term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationDecision {
    pub code: String,
    pub matched_term: String,
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ConfirmationDecision {
    fn decides(&self, m: &ResolvedMatch) -> bool {
        self.code == m.code && self.matched_term.trim().eq_ignore_ascii_case(m.matched_term.trim())
    }
}

#[derive(Debug, Deserialize)]
struct DecisionsResponse {
    #[serde(default)]
    decisions: Vec<ConfirmationDecision>,
}

/// Apply `decisions` to `resolved`. Returns the matches that were dropped.
pub fn apply_decisions(
    resolved: &mut ResolvedEntities,
    decisions: &[ConfirmationDecision],
) -> Vec<ResolvedMatch> {
    let mut rejected = Vec::new();
    resolved.retain(|m| {
        if !m.needs_confirmation() {
            return true;
        }
        let confirmed = decisions.iter().any(|d| d.decides(m) && d.confirmed);
        if !confirmed {
            tracing::warn!(
                code = %m.code,
                term = %m.matched_term,
                entity_type = %m.entity_type,
                "Tentative match rejected"
            );
            rejected.push(m.clone());
        }
        confirmed
    });
    rejected
}

/// Oracle-backed confirmer
pub struct OracleConfirmer {
    oracle: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl OracleConfirmer {
    pub fn new(oracle: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    pub async fn confirm(
        &self,
        question: &str,
        tentative: &[ResolvedMatch],
    ) -> PipelineResult<Vec<ConfirmationDecision>> {
        let candidates: Vec<serde_json::Value> = tentative
            .iter()
            .map(|m| {
                serde_json::json!({
                    "entityType": m.entity_type,
                    "code": m.code,
                    "matchedTerm": m.matched_term,
                    "primaryName": m.primary_name,
                    "confidence": m.confidence,
                })
            })
            .collect();
        let candidates_json =
            serde_json::to_string_pretty(&candidates).map_err(|e| PipelineError::ConfirmationFailed {
                reason: e.to_string(),
            })?;

        let request = CompletionRequest::json(
            OraclePurpose::Confirmation,
            prompts::CONFIRMATION_SYSTEM_PROMPT,
            prompts::confirmation_user_prompt(question, &candidates_json),
        );
        let text = complete_within(self.oracle.as_ref(), request, self.timeout)
            .await
            .map_err(|e| PipelineError::ConfirmationFailed {
                reason: e.to_string(),
            })?;

        let response: DecisionsResponse =
            parse_llm_json_object(&text).map_err(|e| PipelineError::ConfirmationFailed {
                reason: e.to_string(),
            })?;

        tracing::debug!(
            candidates = tentative.len(),
            decisions = response.decisions.len(),
            confirmed = response.decisions.iter().filter(|d| d.confirmed).count(),
            "Confirmation decisions received"
        );
        Ok(response.decisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::{EntityType, MatchType};

    fn resolved(code: &str, term: &str, match_type: MatchType) -> ResolvedMatch {
        ResolvedMatch {
            entity_type: EntityType::Product,
            code: code.to_string(),
            matched_term: term.to_string(),
            primary_name: code.to_string(),
            category: "life".to_string(),
            confidence: match_type.confidence(),
            match_type,
        }
    }

    fn decision(code: &str, term: &str, confirmed: bool) -> ConfirmationDecision {
        ConfirmationDecision {
            code: code.to_string(),
            matched_term: term.to_string(),
            confirmed,
            reason: None,
        }
    }

    fn entities() -> ResolvedEntities {
        ResolvedEntities {
            products: vec![
                resolved("P001", "whole life", MatchType::Alias),
                resolved("P002", "term", MatchType::Fuzzy),
                resolved("P003", "critical", MatchType::Fuzzy),
            ],
            ..ResolvedEntities::default()
        }
    }

    #[test]
    fn test_confirmed_kept_rejected_dropped() {
        let mut e = entities();
        let rejected = apply_decisions(
            &mut e,
            &[decision("P002", "term", false), decision("P003", "Critical", true)],
        );
        let kept: Vec<_> = e.products.iter().map(|m| m.code.as_str()).collect();
        assert_eq!(kept, vec!["P001", "P003"]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].code, "P002");
    }

    #[test]
    fn test_undecided_tentative_match_is_dropped() {
        let mut e = entities();
        let rejected = apply_decisions(&mut e, &[]);
        assert_eq!(e.products.len(), 1);
        assert_eq!(rejected.len(), 2);
    }

    #[test]
    fn test_decision_cannot_drop_confident_match() {
        let mut e = entities();
        apply_decisions(&mut e, &[decision("P001", "whole life", false)]);
        assert!(e.products.iter().any(|m| m.code == "P001"));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Caller".parse::<ConfirmationMode>(), Ok(ConfirmationMode::Caller));
        assert_eq!("oracle".parse::<ConfirmationMode>(), Ok(ConfirmationMode::Oracle));
        assert!("maybe".parse::<ConfirmationMode>().is_err());
    }
}
