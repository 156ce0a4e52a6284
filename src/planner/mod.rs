//! Query Understanding Planner
//!
//! Two oracle calls per run:
//! - extraction: question → [`ExtractedEntities`] (surface terms, no codes)
//! - planning: question + catalogue + resolved codes → [`PlanOutcome`]
//!
//! Both outputs cross the strict JSON boundary in [`crate::ai::json`]. A
//! response that does not parse fails its stage; nothing is guessed.

pub mod prompts;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::ai::{complete_within, parse_llm_json_object, CompletionRequest, LlmClient, OraclePurpose};
use crate::error::{PipelineError, PipelineResult};
use crate::registry::{FunctionSpec, RetrievalFunction};
use crate::vocabulary::{EntityMatcher, EntityType, ResolvedMatch};

// ============================================================================
// Entities
// ============================================================================

/// Surface terms pulled from the question, per entity type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedEntities {
    pub assumptions: Vec<String>,
    pub products: Vec<String>,
    pub categories: Vec<String>,
    pub years: Vec<String>,
    pub other_terms: Vec<String>,
}

impl ExtractedEntities {
    pub fn terms(&self, entity_type: EntityType) -> &[String] {
        match entity_type {
            EntityType::Assumption => &self.assumptions,
            EntityType::Product => &self.products,
            EntityType::Category => &self.categories,
        }
    }
}

/// Vocabulary matches per type plus resolved four-digit years
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolvedEntities {
    pub assumptions: Vec<ResolvedMatch>,
    pub products: Vec<ResolvedMatch>,
    pub categories: Vec<ResolvedMatch>,
    pub years: Vec<String>,
}

impl ResolvedEntities {
    pub fn resolve(matcher: &EntityMatcher, extracted: &ExtractedEntities) -> Self {
        let mut resolved = Self {
            years: matcher.resolve_years(&extracted.years),
            ..Self::default()
        };
        for entity_type in EntityType::ALL {
            *resolved.matches_mut(entity_type) =
                matcher.resolve_all(extracted.terms(entity_type), entity_type);
        }
        resolved
    }

    pub fn matches(&self, entity_type: EntityType) -> &[ResolvedMatch] {
        match entity_type {
            EntityType::Assumption => &self.assumptions,
            EntityType::Product => &self.products,
            EntityType::Category => &self.categories,
        }
    }

    fn matches_mut(&mut self, entity_type: EntityType) -> &mut Vec<ResolvedMatch> {
        match entity_type {
            EntityType::Assumption => &mut self.assumptions,
            EntityType::Product => &mut self.products,
            EntityType::Category => &mut self.categories,
        }
    }

    pub fn all_matches(&self) -> impl Iterator<Item = &ResolvedMatch> {
        self.assumptions
            .iter()
            .chain(self.products.iter())
            .chain(self.categories.iter())
    }

    /// Matches below the confirmation threshold
    pub fn tentative(&self) -> Vec<ResolvedMatch> {
        self.all_matches()
            .filter(|m| m.needs_confirmation())
            .cloned()
            .collect()
    }

    /// Keep only matches for which `keep` holds
    pub fn retain(&mut self, mut keep: impl FnMut(&ResolvedMatch) -> bool) {
        for entity_type in EntityType::ALL {
            self.matches_mut(entity_type).retain(|m| keep(m));
        }
    }

    /// Compact view handed to the planning prompt
    fn to_prompt_json(&self) -> Value {
        let render = |matches: &[ResolvedMatch]| -> Vec<Value> {
            matches
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "code": m.code,
                        "primaryName": m.primary_name,
                        "category": m.category,
                        "matchedTerm": m.matched_term,
                    })
                })
                .collect()
        };
        serde_json::json!({
            "assumptions": render(&self.assumptions),
            "products": render(&self.products),
            "categories": render(&self.categories),
            "years": self.years,
        })
    }
}

// ============================================================================
// Plan
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedCall {
    #[serde(rename = "functionName")]
    pub function: RetrievalFunction,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub intent: String,
    pub calls: Vec<PlannedCall>,
}

impl QueryPlan {
    pub fn function_names(&self) -> Vec<&'static str> {
        self.calls.iter().map(|c| c.function.name()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Plan(QueryPlan),
    MissingInfo(Vec<String>),
}

/// Oracle planning output before function names are checked
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlan {
    #[serde(default)]
    intent: String,
    #[serde(default, alias = "functionCalls")]
    calls: Vec<RawCall>,
    #[serde(default)]
    missing_info: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCall {
    function_name: String,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    reason: String,
}

impl RawPlan {
    fn into_outcome(self) -> PipelineResult<PlanOutcome> {
        let missing: Vec<String> = self
            .missing_info
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if !missing.is_empty() {
            return Ok(PlanOutcome::MissingInfo(missing));
        }
        if self.calls.is_empty() {
            return Ok(PlanOutcome::MissingInfo(vec![
                "no applicable retrieval function".to_string(),
            ]));
        }

        let calls = self
            .calls
            .into_iter()
            .map(|raw| -> PipelineResult<PlannedCall> {
                let function = raw
                    .function_name
                    .parse::<RetrievalFunction>()
                    .map_err(|name| PipelineError::UnknownFunction { name })?;
                Ok(PlannedCall {
                    function,
                    parameters: raw.parameters,
                    reason: raw.reason,
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        Ok(PlanOutcome::Plan(QueryPlan {
            intent: self.intent,
            calls,
        }))
    }
}

/// Parameter keys that carry vocabulary codes, per entity type
const CODE_KEYS: [(&str, EntityType); 4] = [
    ("productCode", EntityType::Product),
    ("productCodes", EntityType::Product),
    ("category", EntityType::Category),
    ("assumptionType", EntityType::Assumption),
];

/// Codes bound in `call` that are not among the confirmed entities.
///
/// `assumptionType` may name an assumption code or the category of a
/// confirmed assumption. Comparison ignores ASCII case.
pub fn unbound_codes(call: &PlannedCall, confirmed: &ResolvedEntities) -> Vec<String> {
    let mut unbound = Vec::new();
    for (key, entity_type) in CODE_KEYS {
        let values: Vec<&str> = match call.parameters.get(key) {
            Some(Value::String(s)) => s.split(',').map(str::trim).collect(),
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::trim).collect(),
            _ => continue,
        };
        let matches = confirmed.matches(entity_type);
        let is_bound = |value: &str| {
            matches.iter().any(|m| {
                m.code.eq_ignore_ascii_case(value)
                    || (entity_type == EntityType::Assumption && m.category.eq_ignore_ascii_case(value))
            })
        };
        unbound.extend(
            values
                .into_iter()
                .filter(|v| !v.is_empty() && !is_bound(v))
                .map(str::to_string),
        );
    }
    unbound
}

// ============================================================================
// Planner
// ============================================================================

pub struct QueryPlanner {
    oracle: Arc<dyn LlmClient>,
    system_prompt: String,
    timeout: Duration,
}

impl QueryPlanner {
    pub fn new(oracle: Arc<dyn LlmClient>, catalogue: &[FunctionSpec], timeout: Duration) -> Self {
        Self {
            oracle,
            system_prompt: prompts::planning_system_prompt(catalogue),
            timeout,
        }
    }

    pub async fn extract(&self, question: &str) -> PipelineResult<ExtractedEntities> {
        let request = CompletionRequest::json(
            OraclePurpose::Extraction,
            prompts::EXTRACTION_SYSTEM_PROMPT,
            prompts::extraction_user_prompt(question),
        );
        let text = complete_within(self.oracle.as_ref(), request, self.timeout)
            .await
            .map_err(|e| PipelineError::ExtractionFailed {
                reason: e.to_string(),
            })?;

        let extracted: ExtractedEntities =
            parse_llm_json_object(&text).map_err(|e| PipelineError::ExtractionFailed {
                reason: e.to_string(),
            })?;

        tracing::debug!(
            assumptions = extracted.assumptions.len(),
            products = extracted.products.len(),
            categories = extracted.categories.len(),
            years = extracted.years.len(),
            "Entities extracted"
        );
        Ok(extracted)
    }

    pub async fn plan(&self, question: &str, resolved: &ResolvedEntities) -> PipelineResult<PlanOutcome> {
        let resolved_json = serde_json::to_string_pretty(&resolved.to_prompt_json()).map_err(|e| {
            PipelineError::PlanningFailed {
                reason: e.to_string(),
            }
        })?;
        let request = CompletionRequest::json(
            OraclePurpose::Planning,
            self.system_prompt.clone(),
            prompts::planning_user_prompt(question, &resolved_json),
        );
        let text = complete_within(self.oracle.as_ref(), request, self.timeout)
            .await
            .map_err(|e| PipelineError::PlanningFailed {
                reason: e.to_string(),
            })?;

        let raw: RawPlan = parse_llm_json_object(&text).map_err(|e| PipelineError::PlanningFailed {
            reason: e.to_string(),
        })?;
        let outcome = raw.into_outcome()?;

        if let PlanOutcome::Plan(plan) = &outcome {
            tracing::debug!(functions = ?plan.function_names(), intent = %plan.intent, "Plan built");
        }
        Ok(outcome)
    }
}
