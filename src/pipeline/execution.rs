//! Per-run state: stages, artifacts and outcome

use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::planner::{ExtractedEntities, QueryPlan, ResolvedEntities};
use crate::registry::ExecutedCall;
use crate::vocabulary::ResolvedMatch;

/// Pipeline state machine
///
/// ```text
/// Extracting → Resolving → (Confirming)? → Planning → Executing → Synthesizing → Done
///                               ↓
///                     AwaitingConfirmation (caller mode)
/// ```
/// `Failed` is reachable from every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Extracting,
    Resolving,
    Confirming,
    AwaitingConfirmation,
    Planning,
    Executing,
    Synthesizing,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::AwaitingConfirmation)
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Extracting => "extracting",
            Self::Resolving => "resolving",
            Self::Confirming => "confirming",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Synthesizing => "synthesizing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub stage: PipelineStage,
    pub elapsed_ms: u64,
}

/// Everything needed to resume a run stopped for caller confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConfirmation {
    pub execution_id: Uuid,
    pub question: String,
    pub extracted: ExtractedEntities,
    pub resolved: ResolvedEntities,
    pub tentative: Vec<ResolvedMatch>,
}

#[derive(Debug)]
pub enum ExecutionOutcome {
    Completed { response: String },
    AwaitingConfirmation(PendingConfirmation),
    Failed(PipelineError),
}

/// One pipeline run. Created per question, never persisted.
#[derive(Debug)]
pub struct PipelineExecution {
    pub execution_id: Uuid,
    pub question: String,
    pub extracted: Option<ExtractedEntities>,
    pub resolved: Option<ResolvedEntities>,
    pub confirmed: Option<ResolvedEntities>,
    pub rejected: Vec<ResolvedMatch>,
    pub plan: Option<QueryPlan>,
    pub results: Vec<ExecutedCall>,
    pub stages: Vec<StageTiming>,
    pub outcome: ExecutionOutcome,
    pub elapsed_ms: u64,
}

impl PipelineExecution {
    pub fn response(&self) -> Option<&str> {
        match &self.outcome {
            ExecutionOutcome::Completed { response } => Some(response),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match &self.outcome {
            ExecutionOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&PendingConfirmation> {
        match &self.outcome {
            ExecutionOutcome::AwaitingConfirmation(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Completed { .. })
    }

    /// Planned function names in call order
    pub fn functions_used(&self) -> Vec<&'static str> {
        self.plan
            .as_ref()
            .map(QueryPlan::function_names)
            .unwrap_or_default()
    }

    pub fn visited(&self) -> Vec<PipelineStage> {
        self.stages.iter().map(|s| s.stage).collect()
    }
}

/// Mutable run state while the orchestrator works through the stages
#[derive(Debug)]
pub(crate) struct ExecutionBuilder {
    pub execution_id: Uuid,
    pub question: String,
    pub extracted: Option<ExtractedEntities>,
    pub resolved: Option<ResolvedEntities>,
    pub confirmed: Option<ResolvedEntities>,
    pub rejected: Vec<ResolvedMatch>,
    pub plan: Option<QueryPlan>,
    pub results: Vec<ExecutedCall>,
    stages: Vec<StageTiming>,
    current: Option<(PipelineStage, Instant)>,
    started: Instant,
}

impl ExecutionBuilder {
    pub fn new(execution_id: Uuid, question: &str) -> Self {
        Self {
            execution_id,
            question: question.to_string(),
            extracted: None,
            resolved: None,
            confirmed: None,
            rejected: Vec::new(),
            plan: None,
            results: Vec::new(),
            stages: Vec::new(),
            current: None,
            started: Instant::now(),
        }
    }

    /// Close the current stage and open `stage`
    pub fn enter(&mut self, stage: PipelineStage) {
        self.close_current();
        tracing::info!(execution_id = %self.execution_id, stage = %stage, "Pipeline stage");
        self.current = Some((stage, Instant::now()));
    }

    fn close_current(&mut self) {
        if let Some((stage, since)) = self.current.take() {
            self.stages.push(StageTiming {
                stage,
                elapsed_ms: since.elapsed().as_millis() as u64,
            });
        }
    }

    pub fn finish(mut self, outcome: ExecutionOutcome) -> PipelineExecution {
        let terminal = match &outcome {
            ExecutionOutcome::Completed { .. } => PipelineStage::Done,
            ExecutionOutcome::AwaitingConfirmation(_) => PipelineStage::AwaitingConfirmation,
            ExecutionOutcome::Failed(_) => PipelineStage::Failed,
        };
        self.close_current();
        self.stages.push(StageTiming {
            stage: terminal,
            elapsed_ms: 0,
        });
        let elapsed_ms = self.started.elapsed().as_millis() as u64;

        match &outcome {
            ExecutionOutcome::Failed(err) if err.needs_more_info() => tracing::info!(
                execution_id = %self.execution_id,
                error = %err,
                elapsed_ms,
                "Pipeline needs more information"
            ),
            ExecutionOutcome::Failed(err) => tracing::error!(
                execution_id = %self.execution_id,
                error = %err,
                error_kind = err.kind(),
                elapsed_ms,
                "Pipeline failed"
            ),
            _ => tracing::info!(
                execution_id = %self.execution_id,
                stage = %terminal,
                calls = self.results.len(),
                elapsed_ms,
                "Pipeline finished"
            ),
        }

        PipelineExecution {
            execution_id: self.execution_id,
            question: self.question,
            extracted: self.extracted,
            resolved: self.resolved,
            confirmed: self.confirmed,
            rejected: self.rejected,
            plan: self.plan,
            results: self.results,
            stages: self.stages,
            outcome,
            elapsed_ms,
        }
    }
}
