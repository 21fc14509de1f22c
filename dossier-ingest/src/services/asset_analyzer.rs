//! Asset analysis adapter
//!
//! Sends a single file to the AI model and receives the five semantic
//! fields used for naming. The adapter owns the tier-fallback policy:
//! an enhanced-tier failure is retried once on the default tier before
//! any error reaches the caller. It never substitutes field values —
//! defaults belong to the assembler.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use thiserror::Error;

use crate::models::AnalysisResult;
use crate::services::gemini_client::{
    GeminiClient, GeminiError, GenerationConfig, Part, ANALYSIS_BUDGET, MODEL_DEFAULT,
    MODEL_ENHANCED,
};

/// Analysis failure, tagged with the originating file name so the
/// orchestrator can report a per-file failure without discarding the
/// rest of the batch
#[derive(Debug, Error)]
#[error("Analysis failed for {file_name}: {message}")]
pub struct AnalysisError {
    pub file_name: String,
    pub message: String,
}

/// Analysis seam; the orchestrator depends on this trait so tests can
/// run the workflow without a network
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        file_name: &str,
        bytes: &[u8],
        mime_type: &str,
        use_enhanced: bool,
    ) -> Result<AnalysisResult, AnalysisError>;
}

/// Gemini-backed analyzer
pub struct AssetAnalyzer {
    client: GeminiClient,
}

impl AssetAnalyzer {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    async fn request(
        &self,
        bytes: &[u8],
        mime_type: &str,
        enhanced: bool,
    ) -> Result<AnalysisResult, GeminiError> {
        let data = STANDARD.encode(bytes);

        let prompt = "Analyze this file and extract its properties for a professional \
                      naming convention: [topic]-[type]-[context]-[variant]-[version]. \
                      Return standard text strings for each field. DO NOT use artificial \
                      spacing between characters. \
                      Return as JSON with keys: topic, type, context, variant, version.";

        let parts = vec![Part::inline_data(mime_type, data), Part::text(prompt)];

        let mut config = GenerationConfig::json().with_schema(analysis_schema());
        let model = if enhanced {
            config = config.with_thinking(ANALYSIS_BUDGET);
            MODEL_ENHANCED
        } else {
            MODEL_DEFAULT
        };

        let text = self.client.generate(model, parts, config).await?;
        serde_json::from_str(&text).map_err(|e| GeminiError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl Analyzer for AssetAnalyzer {
    async fn analyze(
        &self,
        file_name: &str,
        bytes: &[u8],
        mime_type: &str,
        use_enhanced: bool,
    ) -> Result<AnalysisResult, AnalysisError> {
        let first = self.request(bytes, mime_type, use_enhanced).await;

        match first {
            Ok(result) => Ok(result),
            Err(e) if use_enhanced => {
                // Silent capability downgrade: the operation still
                // succeeds from the caller's point of view.
                tracing::warn!(
                    file = file_name,
                    error = %e,
                    "Enhanced analysis failed, retrying on default tier"
                );
                self.request(bytes, mime_type, false)
                    .await
                    .map_err(|e| AnalysisError {
                        file_name: file_name.to_string(),
                        message: e.to_string(),
                    })
            }
            Err(e) => Err(AnalysisError {
                file_name: file_name.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Strict response schema: exactly the five semantic fields
fn analysis_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "topic": {"type": "STRING"},
            "type": {"type": "STRING"},
            "context": {"type": "STRING"},
            "variant": {"type": "STRING"},
            "version": {"type": "STRING"}
        },
        "required": ["topic", "type", "context", "variant", "version"]
    })
}
