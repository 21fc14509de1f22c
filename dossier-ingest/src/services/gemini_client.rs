//! Gemini API client
//!
//! Thin wrapper over the `generateContent` REST endpoint. Two model
//! tiers are exposed: a fast default tier and an enhanced reasoning
//! tier. The enhanced tier requires a paired thinking budget and output
//! ceiling; the service rejects one without the other, so the two
//! travel together in [`ThinkingBudget`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const RATE_LIMIT_MS: u64 = 500; // 2 requests per second

/// Default (fast) model tier
pub const MODEL_DEFAULT: &str = "gemini-3-flash-preview";
/// Enhanced reasoning model tier
pub const MODEL_ENHANCED: &str = "gemini-3-pro-preview";

/// Paired reasoning budget and output-token ceiling
#[derive(Debug, Clone, Copy)]
pub struct ThinkingBudget {
    pub thinking_tokens: u32,
    pub max_output_tokens: u32,
}

/// Budget for per-file analysis requests
pub const ANALYSIS_BUDGET: ThinkingBudget = ThinkingBudget {
    thinking_tokens: 16_384,
    max_output_tokens: 20_480,
};

/// Budget for case-study synthesis requests
pub const SYNTHESIS_BUDGET: ThinkingBudget = ThinkingBudget {
    thinking_tokens: 24_576,
    max_output_tokens: 32_768,
};

/// Gemini client errors
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("No content returned from model")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Minimal rate limiter: at most one request per `min_interval`
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Gemini rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// One part of a request: text or inline binary data
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded content
    pub data: String,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
        }
    }
}

/// Generation configuration attached to a request
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: u32,
}

impl GenerationConfig {
    /// Config requesting a JSON response
    pub fn json() -> Self {
        Self {
            response_mime_type: Some("application/json".to_string()),
            ..Default::default()
        }
    }

    /// Attach a strict response schema
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Attach a thinking budget. Sets the output ceiling at the same
    /// time; the API rejects a thinking budget on its own.
    pub fn with_thinking(mut self, budget: ThinkingBudget) -> Self {
        self.thinking_config = Some(ThinkingConfig {
            thinking_budget: budget.thinking_tokens,
        });
        self.max_output_tokens = Some(budget.max_output_tokens);
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Gemini REST client
pub struct GeminiClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self, GeminiError> {
        Self::with_base_url(api_key, GEMINI_BASE_URL.to_string())
    }

    /// Client pointed at an alternate endpoint (used by tests)
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, GeminiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GeminiError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            api_key,
            base_url,
        })
    }

    /// Issue one `generateContent` request and return the response text
    pub async fn generate(
        &self,
        model: &str,
        parts: Vec<Part>,
        config: GenerationConfig,
    ) -> Result<String, GeminiError> {
        self.rate_limiter.wait().await;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let request = GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: config,
        };

        tracing::debug!(model = model, "Sending generateContent request");

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GeminiError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GeminiError::ApiError(status.as_u16(), error_text));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GeminiError::ParseError(e.to_string()))?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .filter(|text| !text.is_empty())
            .ok_or(GeminiError::EmptyResponse)
    }
}
