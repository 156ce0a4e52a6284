//! Error types for the query pipeline
//!
//! Three layers:
//! - `PipelineError`: terminal failures of one pipeline execution
//! - `RetrievalError`: local to a single planned function call, never thrown
//!   past `Registry::execute`
//! - `DataError`: loading the vocabulary and the two read-only stores

use thiserror::Error;

/// Terminal failure of a pipeline execution.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Entity extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    #[error("Match confirmation failed: {reason}")]
    ConfirmationFailed { reason: String },

    #[error("Query planning failed: {reason}")]
    PlanningFailed { reason: String },

    #[error("Required information is missing: {}", missing.join(", "))]
    MissingEntity { missing: Vec<String> },

    #[error("Plan referenced unknown retrieval function '{name}'")]
    UnknownFunction { name: String },

    #[error("Response synthesis failed: {reason}")]
    SynthesisFailed { reason: String },
}

impl PipelineError {
    /// Stable tag reported to callers as `errorKind`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExtractionFailed { .. } => "extraction_failed",
            Self::ConfirmationFailed { .. } => "confirmation_failed",
            Self::PlanningFailed { .. } => "planning_failed",
            Self::MissingEntity { .. } => "missing_entity",
            Self::UnknownFunction { .. } => "unknown_function",
            Self::SynthesisFailed { .. } => "synthesis_failed",
        }
    }

    /// Whether the caller should re-prompt the user instead of retrying
    pub fn needs_more_info(&self) -> bool {
        matches!(self, Self::MissingEntity { .. })
    }
}

/// Failure of a single retrieval function call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    #[error("Missing required parameters: {}", keys.join(", "))]
    MissingParams { keys: Vec<String> },

    #[error("Invalid parameter '{key}': {reason}")]
    InvalidParam { key: String, reason: String },

    #[error("Unknown assumption '{0}'")]
    UnknownAssumption(String),

    #[error("Unknown product '{0}'")]
    UnknownProduct(String),

    #[error("Unknown category '{0}'")]
    UnknownCategory(String),

    #[error("No statistics for year '{0}'")]
    UnknownYear(String),

    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("Codes were not resolved or confirmed for this question: {}", codes.join(", "))]
    UnboundCode { codes: Vec<String> },

    #[error("Threshold filter needs metricType, threshold and comparison together (missing: {})", missing.join(", "))]
    IncompleteFilter { missing: Vec<String> },
}

impl RetrievalError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingParams { .. } => "missing_params",
            Self::InvalidParam { .. } => "invalid_param",
            Self::UnknownAssumption(_) => "unknown_assumption",
            Self::UnknownProduct(_) => "unknown_product",
            Self::UnknownCategory(_) => "unknown_category",
            Self::UnknownYear(_) => "unknown_year",
            Self::UnknownMetric(_) => "unknown_metric",
            Self::IncompleteFilter { .. } => "incomplete_filter",
            Self::UnboundCode { .. } => "unbound_code",
        }
    }
}

/// Errors loading static data at process start.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate {entity_type} code '{code}'")]
    DuplicateCode { entity_type: String, code: String },

    #[error("Empty primary name for {entity_type} code '{code}'")]
    EmptyPrimaryName { entity_type: String, code: String },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entity_message_lists_everything() {
        let err = PipelineError::MissingEntity {
            missing: vec!["product".to_string(), "year".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Required information is missing: product, year"
        );
        assert!(err.needs_more_info());
        assert_eq!(err.kind(), "missing_entity");
    }

    #[test]
    fn test_only_missing_entity_asks_for_more_info() {
        let err = PipelineError::ExtractionFailed {
            reason: "no JSON".to_string(),
        };
        assert!(!err.needs_more_info());
    }

    #[test]
    fn test_retrieval_error_kind() {
        assert_eq!(
            RetrievalError::UnknownYear("1999".into()).kind(),
            "unknown_year"
        );
        let err = RetrievalError::MissingParams {
            keys: vec!["year".into()],
        };
        assert!(err.to_string().contains("year"));
    }
}
