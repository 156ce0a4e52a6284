//! Query Orchestrator
//!
//! Sequences matcher → planner → registry → synthesizer for one question and
//! owns the confirmation sub-flow. Every oracle step is bounded by the
//! configured timeout and is never retried; the first failure is terminal for
//! that run. A failed retrieval call is not a pipeline failure: its result is
//! kept and handed to the synthesizer with the others. A planned call that
//! binds a code outside the confirmed entities is not executed and reports
//! `unbound_code`.
//!
//! Runs share only the read-only vocabulary and stores, so
//! [`Orchestrator::run_parallel`] simply joins two independent runs.

pub mod execution;

pub use execution::{
    ExecutionOutcome, PendingConfirmation, PipelineExecution, PipelineStage, StageTiming,
};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::ai::LlmClient;
use crate::confirmation::{apply_decisions, ConfirmationDecision, ConfirmationMode, OracleConfirmer};
use crate::error::{PipelineError, PipelineResult, RetrievalError};
use crate::planner::{unbound_codes, PlanOutcome, QueryPlanner, ResolvedEntities};
use crate::registry::{ExecutedCall, Registry, RetrievalResult};
use crate::store::DataContext;
use crate::synthesizer::ResponseSynthesizer;
use crate::vocabulary::EntityMatcher;
use execution::ExecutionBuilder;

/// Runtime knobs for the orchestrator
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub oracle_timeout: Duration,
    pub confirmation_mode: ConfirmationMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_secs(30),
            confirmation_mode: ConfirmationMode::Oracle,
        }
    }
}

/// Two runs of the same question, side by side
#[derive(Debug)]
pub struct ParallelRun {
    pub first: PipelineExecution,
    pub second: PipelineExecution,
}

impl ParallelRun {
    pub fn functions_used_match(&self) -> bool {
        self.first.functions_used() == self.second.functions_used()
    }

    pub fn responses_identical(&self) -> bool {
        match (self.first.response(), self.second.response()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Serializable digest of a [`ParallelRun`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelSummary {
    pub functions_used_match: bool,
    pub responses_identical: bool,
}

pub struct Orchestrator {
    matcher: EntityMatcher,
    registry: Registry,
    planner: QueryPlanner,
    confirmer: OracleConfirmer,
    synthesizer: ResponseSynthesizer,
    config: PipelineConfig,
    oracle: Arc<dyn LlmClient>,
}

impl Orchestrator {
    pub fn new(ctx: &DataContext, oracle: Arc<dyn LlmClient>, config: PipelineConfig) -> Self {
        let registry = Registry::new(ctx);
        let timeout = config.oracle_timeout;
        Self {
            matcher: EntityMatcher::new(Arc::clone(&ctx.vocabulary)),
            planner: QueryPlanner::new(Arc::clone(&oracle), &registry.catalogue(), timeout),
            confirmer: OracleConfirmer::new(Arc::clone(&oracle), timeout),
            synthesizer: ResponseSynthesizer::new(Arc::clone(&oracle), timeout),
            registry,
            config,
            oracle,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn oracle_model(&self) -> &str {
        self.oracle.model_name()
    }

    /// Run the full pipeline for one question
    pub async fn run(&self, question: &str) -> PipelineExecution {
        let mut exec = ExecutionBuilder::new(Uuid::new_v4(), question);
        tracing::info!(
            execution_id = %exec.execution_id,
            provider = self.oracle.provider_name(),
            model = self.oracle.model_name(),
            "Pipeline started"
        );
        let outcome = self.run_from_start(&mut exec).await;
        exec.finish(outcome.unwrap_or_else(ExecutionOutcome::Failed))
    }

    /// Continue a run stopped in `AwaitingConfirmation` with caller decisions.
    ///
    /// Only the extracted terms are taken from `pending`; matches are
    /// resolved again against the vocabulary, so a caller cannot raise a
    /// confidence or add a code on the way back.
    pub async fn resume(
        &self,
        pending: PendingConfirmation,
        decisions: &[ConfirmationDecision],
    ) -> PipelineExecution {
        let mut exec = ExecutionBuilder::new(pending.execution_id, &pending.question);
        tracing::info!(
            execution_id = %exec.execution_id,
            decisions = decisions.len(),
            "Pipeline resumed"
        );

        exec.enter(PipelineStage::Confirming);
        let mut confirmed = ResolvedEntities::resolve(&self.matcher, &pending.extracted);
        if confirmed != pending.resolved {
            tracing::warn!(
                execution_id = %exec.execution_id,
                "Pending resolution differs from the vocabulary, using the vocabulary"
            );
        }
        exec.extracted = Some(pending.extracted);
        exec.resolved = Some(confirmed.clone());
        exec.rejected = apply_decisions(&mut confirmed, decisions);

        let outcome = self.run_from_planning(&mut exec, confirmed).await;
        exec.finish(outcome.unwrap_or_else(ExecutionOutcome::Failed))
    }

    /// Two independent runs of the same question, joined
    pub async fn run_parallel(&self, question: &str) -> ParallelRun {
        let (first, second) = futures::future::join(self.run(question), self.run(question)).await;
        let run = ParallelRun { first, second };
        tracing::info!(
            first = %run.first.execution_id,
            second = %run.second.execution_id,
            functions_used_match = run.functions_used_match(),
            responses_identical = run.responses_identical(),
            "Parallel runs joined"
        );
        run
    }

    async fn run_from_start(&self, exec: &mut ExecutionBuilder) -> PipelineResult<ExecutionOutcome> {
        // ── Step 1: Extraction ──────────────────────────────────────
        exec.enter(PipelineStage::Extracting);
        let extracted = self.planner.extract(&exec.question).await?;
        exec.extracted = Some(extracted.clone());

        // ── Step 2: Resolution ──────────────────────────────────────
        exec.enter(PipelineStage::Resolving);
        let mut resolved = ResolvedEntities::resolve(&self.matcher, &extracted);
        exec.resolved = Some(resolved.clone());
        tracing::debug!(
            execution_id = %exec.execution_id,
            assumptions = resolved.assumptions.len(),
            products = resolved.products.len(),
            categories = resolved.categories.len(),
            years = ?resolved.years,
            "Entities resolved"
        );

        // ── Step 3: Confirmation (only for tentative matches) ───────
        let tentative = resolved.tentative();
        if !tentative.is_empty() {
            exec.enter(PipelineStage::Confirming);
            match self.config.confirmation_mode {
                ConfirmationMode::Oracle => {
                    let decisions = self.confirmer.confirm(&exec.question, &tentative).await?;
                    exec.rejected = apply_decisions(&mut resolved, &decisions);
                }
                ConfirmationMode::Caller => {
                    tracing::info!(
                        execution_id = %exec.execution_id,
                        tentative = tentative.len(),
                        "Awaiting caller confirmation"
                    );
                    return Ok(ExecutionOutcome::AwaitingConfirmation(PendingConfirmation {
                        execution_id: exec.execution_id,
                        question: exec.question.clone(),
                        extracted,
                        resolved,
                        tentative,
                    }));
                }
            }
        }

        self.run_from_planning(exec, resolved).await
    }

    async fn run_from_planning(
        &self,
        exec: &mut ExecutionBuilder,
        confirmed: ResolvedEntities,
    ) -> PipelineResult<ExecutionOutcome> {
        exec.confirmed = Some(confirmed.clone());

        // ── Step 4: Planning ────────────────────────────────────────
        exec.enter(PipelineStage::Planning);
        let plan = match self.planner.plan(&exec.question, &confirmed).await? {
            PlanOutcome::Plan(plan) => plan,
            PlanOutcome::MissingInfo(missing) => {
                return Err(PipelineError::MissingEntity { missing });
            }
        };
        exec.plan = Some(plan.clone());

        // ── Step 5: Execution ───────────────────────────────────────
        exec.enter(PipelineStage::Executing);
        let execution_id = exec.execution_id;
        exec.results = plan
            .calls
            .iter()
            .map(|call| {
                let unbound = unbound_codes(call, &confirmed);
                let result = if unbound.is_empty() {
                    self.registry.execute(call.function, &call.parameters)
                } else {
                    tracing::warn!(
                        execution_id = %execution_id,
                        function = %call.function,
                        codes = ?unbound,
                        "Call binds unconfirmed codes, not executed"
                    );
                    RetrievalResult::failure(&RetrievalError::UnboundCode { codes: unbound }, None)
                };
                ExecutedCall {
                    function: call.function,
                    parameters: call.parameters.clone(),
                    result,
                }
            })
            .collect();
        let failed = exec.results.iter().filter(|c| !c.result.success).count();
        if failed > 0 {
            tracing::warn!(
                execution_id = %exec.execution_id,
                failed,
                total = exec.results.len(),
                "Some retrieval calls failed"
            );
        }

        // ── Step 6: Synthesis ───────────────────────────────────────
        exec.enter(PipelineStage::Synthesizing);
        let response = self
            .synthesizer
            .synthesize(&exec.question, &plan, &exec.results)
            .await?;

        Ok(ExecutionOutcome::Completed { response })
    }
}
