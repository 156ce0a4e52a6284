//! Google Gemini API Client Implementation
//!
//! `generateContent` over HTTPS. JSON-mode requests set
//! `responseMimeType: application/json` so the model returns a bare object.

use super::{AiConfig, AiError, AiResult, CompletionRequest, LlmClient};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: AiConfig,
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: Option<u32>,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: AiConfig) -> AiResult<Self> {
        if config.api_key.is_empty() {
            return Err(AiError::AuthenticationError);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(AiError::HttpError)?;

        Ok(Self {
            config,
            client,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint (proxies, local emulators)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        GeminiRequest {
            system_instruction: Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: request.system_prompt.clone(),
                }],
            }),
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: request.user_prompt.clone(),
                }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
                response_mime_type: request.json_mode.then_some("application/json"),
            }),
        }
    }

    fn extract_text(response: GeminiResponse) -> AiResult<String> {
        if let Some(usage) = &response.usage_metadata {
            info!(
                prompt_tokens = ?usage.prompt_token_count,
                response_tokens = ?usage.candidates_token_count,
                total_tokens = ?usage.total_token_count,
                "Gemini API usage"
            );
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AiError::InvalidResponse("No candidates in response".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AiError::InvalidResponse(format!(
                "Empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> AiResult<String> {
        let body = self.build_request(&request);
        // Key goes in a header; reqwest errors quote the URL
        let url = format!("{}/{}:generateContent", self.base_url, self.config.model);

        debug!(
            purpose = %request.purpose,
            json_mode = request.json_mode,
            "Sending request to Gemini API: {}",
            url
        );

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::HttpError(e.without_url()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AiError::HttpError(e.without_url()))?;

        if !status.is_success() {
            error!("Gemini API error: {} - {}", status, response_text);
            return Err(AiError::ApiError(format!(
                "HTTP {}: {}",
                status, response_text
            )));
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AiError::JsonError(e)
        })?;

        Self::extract_text(parsed)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn provider_name(&self) -> &str {
        "Gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::OraclePurpose;

    fn create_test_config() -> AiConfig {
        AiConfig {
            api_key: "test-key".to_string(),
            model: "gemini-2.5-flash".to_string(),
            max_tokens: Some(1024),
            temperature: Some(0.1),
            timeout_seconds: 30,
        }
    }

    #[test]
    fn test_gemini_client_creation() {
        let client = GeminiClient::new(create_test_config()).unwrap();
        assert_eq!(client.model_name(), "gemini-2.5-flash");
        assert_eq!(client.provider_name(), "Gemini");
    }

    #[test]
    fn test_gemini_client_empty_api_key() {
        let mut config = create_test_config();
        config.api_key = "".to_string();
        let client = GeminiClient::new(config);
        assert!(matches!(client.err(), Some(AiError::AuthenticationError)));
    }

    #[test]
    fn test_json_mode_sets_mime_type() {
        let client = GeminiClient::new(create_test_config()).unwrap();
        let req = CompletionRequest::json(OraclePurpose::Extraction, "sys", "question");
        let body = serde_json::to_value(client.build_request(&req)).unwrap();

        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["contents"][0]["role"], "user");
    }

    #[test]
    fn test_prose_mode_omits_mime_type() {
        let client = GeminiClient::new(create_test_config()).unwrap();
        let req = CompletionRequest::prose(OraclePurpose::Synthesis, "sys", "question");
        let body = serde_json::to_value(client.build_request(&req)).unwrap();
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let raw = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Hello "}, {"text": "world"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "totalTokenCount": 12}
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(GeminiClient::extract_text(parsed).unwrap(), "Hello world");
    }

    #[test]
    fn test_extract_text_rejects_empty_candidates() {
        let parsed: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            GeminiClient::extract_text(parsed),
            Err(AiError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_api_key() {
        let mut config = create_test_config();
        config.api_key = "SECRET123".to_string();
        config.timeout_seconds = 2;
        let client = GeminiClient::new(config)
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let req = CompletionRequest::json(OraclePurpose::Planning, "sys", "question");

        let err = client.complete(req).await.unwrap_err();
        assert!(matches!(err, AiError::HttpError(_)));
        assert!(!err.to_string().contains("SECRET123"));
        assert!(!format!("{:?}", err).contains("SECRET123"));
    }

    // Integration test - requires API key
    #[tokio::test]
    #[ignore = "Requires GEMINI_API_KEY environment variable"]
    async fn test_gemini_integration() {
        let config = crate::config::AppConfig::from_env().unwrap();
        let client = GeminiClient::new(config.ai).unwrap();
        let req = CompletionRequest::json(
            OraclePurpose::Extraction,
            "Return a JSON object with a single key \"ok\" set to true.",
            "ping",
        );
        let text = client.complete(req).await.unwrap();
        assert!(text.contains("ok"));
    }
}
