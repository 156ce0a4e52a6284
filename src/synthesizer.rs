//! Response Synthesizer
//!
//! Narrates retrieval results against the question. Failed calls are passed
//! to the oracle as-is so the answer can explain them. An oracle failure here
//! is returned raw; there is no fallback text.

use std::sync::Arc;
use std::time::Duration;

use crate::ai::{complete_within, CompletionRequest, LlmClient, OraclePurpose};
use crate::error::{PipelineError, PipelineResult};
use crate::planner::{prompts, QueryPlan};
use crate::registry::ExecutedCall;

pub struct ResponseSynthesizer {
    oracle: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl ResponseSynthesizer {
    pub fn new(oracle: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    pub async fn synthesize(
        &self,
        question: &str,
        plan: &QueryPlan,
        results: &[ExecutedCall],
    ) -> PipelineResult<String> {
        let failed = |e: serde_json::Error| PipelineError::SynthesisFailed {
            reason: e.to_string(),
        };
        let plan_json = serde_json::to_string_pretty(plan).map_err(failed)?;
        let results_json = serde_json::to_string_pretty(results).map_err(failed)?;

        let request = CompletionRequest::prose(
            OraclePurpose::Synthesis,
            prompts::SYNTHESIS_SYSTEM_PROMPT,
            prompts::synthesis_user_prompt(question, &plan_json, &results_json),
        );
        let text = complete_within(self.oracle.as_ref(), request, self.timeout)
            .await
            .map_err(|e| PipelineError::SynthesisFailed {
                reason: e.to_string(),
            })?;

        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::SynthesisFailed {
                reason: "oracle returned an empty response".to_string(),
            });
        }

        tracing::debug!(
            calls = results.len(),
            failed_calls = results.iter().filter(|c| !c.result.success).count(),
            response_chars = text.chars().count(),
            "Response synthesized"
        );
        Ok(text.to_string())
    }
}
