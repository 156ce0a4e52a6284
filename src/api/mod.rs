//! Caller-facing request and response types
//!
//! [`handle_query`] and [`handle_confirm`] are transport-independent; the
//! axum router in [`routes`] (feature `server`) is a thin wrapper over them.

#[cfg(feature = "server")]
pub mod routes;

use serde::{Deserialize, Serialize};

use crate::confirmation::ConfirmationDecision;
use crate::pipeline::{
    ExecutionOutcome, Orchestrator, ParallelRun, ParallelSummary, PendingConfirmation,
    PipelineExecution, StageTiming,
};
use crate::planner::{ExtractedEntities, QueryPlan, ResolvedEntities};
use crate::registry::ExecutedCall;
use crate::vocabulary::ResolvedMatch;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub execute_in_parallel: bool,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub pending: PendingConfirmation,
    #[serde(default)]
    pub decisions: Vec<ConfirmationDecision>,
    #[serde(default)]
    pub debug: bool,
}

/// Intermediate artifacts of one run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub execution_id: String,
    pub extracted_entities: Option<ExtractedEntities>,
    pub resolved_entities: Option<ResolvedEntities>,
    pub confirmed_entities: Option<ResolvedEntities>,
    pub rejected_matches: Vec<ResolvedMatch>,
    pub plan: Option<QueryPlan>,
    pub functions_used: Vec<&'static str>,
    pub retrieval_results: Vec<ExecutedCall>,
    pub stages: Vec<StageTiming>,
}

impl DebugInfo {
    fn from_execution(exec: &PipelineExecution) -> Self {
        Self {
            execution_id: exec.execution_id.to_string(),
            extracted_entities: exec.extracted.clone(),
            resolved_entities: exec.resolved.clone(),
            confirmed_entities: exec.confirmed.clone(),
            rejected_matches: exec.rejected.clone(),
            plan: exec.plan.clone(),
            functions_used: exec.functions_used(),
            retrieval_results: exec.results.clone(),
            stages: exec.stages.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub needs_more_info: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_info: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_confirmation: Option<PendingConfirmation>,
    pub functions_used: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
    pub elapsed_ms: u64,
}

impl QueryResponse {
    pub fn from_execution(exec: &PipelineExecution, debug: bool) -> Self {
        let mut response = Self {
            success: false,
            response: None,
            needs_more_info: false,
            missing_info: Vec::new(),
            error: None,
            error_kind: None,
            pending_confirmation: None,
            functions_used: exec.functions_used(),
            debug: debug.then(|| DebugInfo::from_execution(exec)),
            elapsed_ms: exec.elapsed_ms,
        };

        match &exec.outcome {
            ExecutionOutcome::Completed { response: text } => {
                response.success = true;
                response.response = Some(text.clone());
            }
            ExecutionOutcome::AwaitingConfirmation(pending) => {
                response.pending_confirmation = Some(pending.clone());
            }
            ExecutionOutcome::Failed(err) => {
                if let crate::error::PipelineError::MissingEntity { missing } = err {
                    response.needs_more_info = true;
                    response.missing_info = missing.clone();
                }
                response.error = Some(err.to_string());
                response.error_kind = Some(err.kind().to_string());
            }
        }
        response
    }

    fn rejected(reason: &str, kind: &str) -> Self {
        Self {
            success: false,
            response: None,
            needs_more_info: false,
            missing_info: Vec::new(),
            error: Some(reason.to_string()),
            error_kind: Some(kind.to_string()),
            pending_confirmation: None,
            functions_used: Vec::new(),
            debug: None,
            elapsed_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelResponse {
    pub success: bool,
    pub runs: Vec<QueryResponse>,
    #[serde(flatten)]
    pub summary: ParallelSummary,
}

impl ParallelResponse {
    pub fn from_run(run: &ParallelRun, debug: bool) -> Self {
        let runs = vec![
            QueryResponse::from_execution(&run.first, debug),
            QueryResponse::from_execution(&run.second, debug),
        ];
        Self {
            success: runs.iter().all(|r| r.success),
            runs,
            summary: ParallelSummary {
                functions_used_match: run.functions_used_match(),
                responses_identical: run.responses_identical(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryReply {
    Single(QueryResponse),
    Parallel(ParallelResponse),
}

impl QueryReply {
    pub fn success(&self) -> bool {
        match self {
            Self::Single(r) => r.success,
            Self::Parallel(r) => r.success,
        }
    }
}

pub const INVALID_REQUEST: &str = "invalid_request";

pub async fn handle_query(orchestrator: &Orchestrator, request: QueryRequest) -> QueryReply {
    let question = request.question.trim();
    if question.is_empty() {
        return QueryReply::Single(QueryResponse::rejected("question must not be empty", INVALID_REQUEST));
    }

    if request.execute_in_parallel {
        let run = orchestrator.run_parallel(question).await;
        QueryReply::Parallel(ParallelResponse::from_run(&run, request.debug))
    } else {
        let exec = orchestrator.run(question).await;
        QueryReply::Single(QueryResponse::from_execution(&exec, request.debug))
    }
}

pub async fn handle_confirm(orchestrator: &Orchestrator, request: ConfirmRequest) -> QueryResponse {
    if request.pending.question.trim().is_empty() {
        return QueryResponse::rejected("pending confirmation has no question", INVALID_REQUEST);
    }
    let exec = orchestrator.resume(request.pending, &request.decisions).await;
    QueryResponse::from_execution(&exec, request.debug)
}
