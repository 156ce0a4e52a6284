//! Generative-language oracle abstraction
//!
//! The pipeline treats the model as an opaque text-completion capability.
//! Every call carries its `OraclePurpose` so clients can log it and test
//! doubles can script a response per pipeline step.

pub mod gemini;
pub mod json;

pub use gemini::GeminiClient;
pub use json::parse_llm_json_object;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default Gemini model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Which pipeline step is asking the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OraclePurpose {
    Extraction,
    Confirmation,
    Planning,
    Synthesis,
}

impl std::fmt::Display for OraclePurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Extraction => "extraction",
            Self::Confirmation => "confirmation",
            Self::Planning => "planning",
            Self::Synthesis => "synthesis",
        };
        f.write_str(s)
    }
}

/// A single completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub purpose: OraclePurpose,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Ask the provider for machine-structured (JSON) output
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn json(
        purpose: OraclePurpose,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            purpose,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            json_mode: true,
        }
    }

    pub fn prose(
        purpose: OraclePurpose,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            purpose,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            json_mode: false,
        }
    }
}

/// Opaque text-completion oracle
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete the request, returning the raw model text
    async fn complete(&self, request: CompletionRequest) -> AiResult<String>;

    fn model_name(&self) -> &str;

    fn provider_name(&self) -> &str;
}

/// Oracle client configuration. `Default` has no key; populate from
/// [`crate::config::AppConfig`].
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_seconds: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: Some(2048),
            temperature: Some(0.1),
            timeout_seconds: 30,
        }
    }
}

/// Oracle client errors
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Missing or empty API key")]
    AuthenticationError,

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Oracle call timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

pub type AiResult<T> = Result<T, AiError>;

/// Run one completion bounded by `limit`. No retry.
pub async fn complete_within(
    client: &dyn LlmClient,
    request: CompletionRequest,
    limit: std::time::Duration,
) -> AiResult<String> {
    let purpose = request.purpose;
    match tokio::time::timeout(limit, client.complete(request)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                purpose = %purpose,
                provider = client.provider_name(),
                timeout_secs = limit.as_secs(),
                "Oracle call timed out"
            );
            Err(AiError::Timeout {
                seconds: limit.as_secs(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_constructors() {
        let req = CompletionRequest::json(OraclePurpose::Planning, "sys", "user");
        assert!(req.json_mode);
        assert_eq!(req.purpose, OraclePurpose::Planning);

        let req = CompletionRequest::prose(OraclePurpose::Synthesis, "sys", "user");
        assert!(!req.json_mode);
    }

    struct Stalled;

    #[async_trait]
    impl LlmClient for Stalled {
        async fn complete(&self, _request: CompletionRequest) -> AiResult<String> {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok("{}".to_string())
        }

        fn model_name(&self) -> &str {
            "stalled"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    #[tokio::test]
    async fn test_complete_within_times_out() {
        let request = CompletionRequest::json(OraclePurpose::Extraction, "sys", "user");
        let err = complete_within(&Stalled, request, std::time::Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Timeout { .. }));
    }

    #[test]
    fn test_purpose_display() {
        assert_eq!(OraclePurpose::Extraction.to_string(), "extraction");
        assert_eq!(OraclePurpose::Confirmation.to_string(), "confirmation");
    }

    #[test]
    fn test_default_config_has_no_key() {
        let config = AiConfig::default();
        assert!(config.api_key.is_empty());
        assert_eq!(config.model, DEFAULT_MODEL);
    }
}
