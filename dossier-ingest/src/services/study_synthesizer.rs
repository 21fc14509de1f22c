//! Case-study synthesis adapter
//!
//! Asks the AI model to write a structured narrative from a small batch
//! of assets. Failure policy: the enhanced path falls back to the fast
//! tier with a simplified, non-strict prompt before giving up; a second
//! failure surfaces as a synthesis error, distinct from analysis errors
//! so the UI can tell "could not read your files" from "could not write
//! your story". Model output is defensively de-mangled — the contract
//! forbids letter-spaced prose but the model does not always honor it.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use crate::models::{Asset, NarrativeResult};
use crate::services::gemini_client::{
    GeminiClient, GeminiError, GenerationConfig, Part, MODEL_DEFAULT, MODEL_ENHANCED,
    SYNTHESIS_BUDGET,
};

/// At most this many most-recently-staged assets inform the narrative.
/// Older staged assets still ride along as the study's artifacts.
pub const NARRATIVE_ASSET_LIMIT: usize = 3;

#[derive(Debug, Error)]
#[error("Case study synthesis failed: {message}")]
pub struct SynthesisError {
    pub message: String,
}

/// Synthesis seam for the orchestrator
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        assets: &[Asset],
        context_hint: &str,
        use_enhanced: bool,
    ) -> Result<NarrativeResult, SynthesisError>;
}

/// Gemini-backed synthesizer
pub struct StudySynthesizer {
    client: GeminiClient,
}

impl StudySynthesizer {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    async fn request_structured(
        &self,
        assets: &[Asset],
        context_hint: &str,
        enhanced: bool,
    ) -> Result<NarrativeResult, GeminiError> {
        let asset_info = assets
            .iter()
            .map(|a| format!("- {} ({}, {})", a.ai_name, a.topic, a.context))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Based on these design artifacts:\n{asset_info}\n\n\
             And this user context: \"{context_hint}\"\n\n\
             Create a professional UX/FE mini-case study.\n\
             IMPORTANT: Return standard, human-readable text. DO NOT add spaces \
             between every letter (e.g., return \"User Account\" not \"U S E R  A C C O U N T\").\n\n\
             Format:\n\
             - title: Clear, descriptive title.\n\
             - problem: Concise challenge statement.\n\
             - approach: Technical methodology.\n\
             - outcome: Results achieved.\n\
             - nextSteps: Future roadmap.\n\
             - seoMetadata: {{ title, description, keywords[] }}\n\
             - tags: 3 string tags.\n\n\
             Return as a structured JSON object."
        );

        let mut config = GenerationConfig::json().with_schema(narrative_schema());
        if enhanced {
            config = config.with_thinking(SYNTHESIS_BUDGET);
        }

        let text = self
            .client
            .generate(MODEL_ENHANCED, vec![Part::text(prompt)], config)
            .await?;
        serde_json::from_str(&text).map_err(|e| GeminiError::ParseError(e.to_string()))
    }

    /// Lower-capability fallback: fast tier, simplified prompt, no
    /// strict schema — a best-effort structured response is accepted
    async fn request_fallback(&self, assets: &[Asset]) -> Result<NarrativeResult, GeminiError> {
        let names = assets
            .iter()
            .map(|a| a.ai_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let prompt = format!(
            "Based on these design artifacts:\n{names}\n\n\
             Create a case study JSON with title, problem, approach, outcome, \
             nextSteps, tags, and seoMetadata (title, description, keywords)."
        );

        let text = self
            .client
            .generate(MODEL_DEFAULT, vec![Part::text(prompt)], GenerationConfig::json())
            .await?;
        serde_json::from_str(&text).map_err(|e| GeminiError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl Synthesizer for StudySynthesizer {
    async fn synthesize(
        &self,
        assets: &[Asset],
        context_hint: &str,
        use_enhanced: bool,
    ) -> Result<NarrativeResult, SynthesisError> {
        let recent = recent_assets(assets);

        let first = self
            .request_structured(recent, context_hint, use_enhanced)
            .await;

        let narrative = match first {
            Ok(narrative) => narrative,
            Err(e) if use_enhanced => {
                tracing::warn!(error = %e, "Enhanced synthesis failed, retrying on fallback tier");
                self.request_fallback(recent)
                    .await
                    .map_err(|e| SynthesisError {
                        message: e.to_string(),
                    })?
            }
            Err(e) => {
                return Err(SynthesisError {
                    message: e.to_string(),
                })
            }
        };

        Ok(sanitize_narrative(narrative))
    }
}

/// The slice of staged assets that informs the narrative: the last
/// [`NARRATIVE_ASSET_LIMIT`] in staging order
pub(crate) fn recent_assets(assets: &[Asset]) -> &[Asset] {
    &assets[assets.len().saturating_sub(NARRATIVE_ASSET_LIMIT)..]
}

fn narrative_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {"type": "STRING"},
            "problem": {"type": "STRING"},
            "approach": {"type": "STRING"},
            "outcome": {"type": "STRING"},
            "nextSteps": {"type": "STRING"},
            "tags": {"type": "ARRAY", "items": {"type": "STRING"}},
            "seoMetadata": {
                "type": "OBJECT",
                "properties": {
                    "title": {"type": "STRING"},
                    "description": {"type": "STRING"},
                    "keywords": {"type": "ARRAY", "items": {"type": "STRING"}}
                }
            }
        },
        "required": ["title", "problem", "approach", "outcome", "nextSteps", "tags", "seoMetadata"]
    })
}

/// Collapse letter-spaced prose on every narrative text field
fn sanitize_narrative(mut narrative: NarrativeResult) -> NarrativeResult {
    let fix = |value: Option<String>| value.map(|s| collapse_letter_spacing(&s));
    narrative.title = fix(narrative.title);
    narrative.problem = fix(narrative.problem);
    narrative.approach = fix(narrative.approach);
    narrative.outcome = fix(narrative.outcome);
    narrative.next_steps = fix(narrative.next_steps);
    narrative
}

/// Rejoin text the model mangled into single-character tokens
///
/// Mangled words arrive as runs of single characters separated by
/// single spaces, with double spaces marking real word boundaries:
/// `"U S E R  A C C O U N T"` → `"USER ACCOUNT"`. Normal prose is
/// left untouched — the collapse only runs when most tokens are
/// single characters.
pub(crate) fn collapse_letter_spacing(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 4 {
        return text.to_string();
    }
    let singles = words.iter().filter(|w| w.chars().count() == 1).count();
    if singles * 2 <= words.len() {
        return text.to_string();
    }

    text.split("  ")
        .filter_map(|group| {
            let parts: Vec<&str> = group.split(' ').filter(|p| !p.is_empty()).collect();
            if parts.is_empty() {
                return None;
            }
            if parts.len() >= 2 && parts.iter().all(|p| p.chars().count() == 1) {
                Some(parts.concat())
            } else {
                Some(parts.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> Asset {
        Asset {
            id: dossier_common::ids::local_token(),
            original_name: name.to_string(),
            ai_name: name.to_string(),
            kind: "file".to_string(),
            topic: "misc".to_string(),
            context: "dev".to_string(),
            variant: "v1".to_string(),
            version: "1.0".to_string(),
            file_type: "md".to_string(),
            url: String::new(),
            size: 1,
        }
    }

    #[test]
    fn recent_assets_takes_the_last_three() {
        let assets: Vec<Asset> = ["a", "b", "c", "d"].iter().map(|n| asset(n)).collect();
        let recent = recent_assets(&assets);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].ai_name, "b");
        assert_eq!(recent[2].ai_name, "d");
    }

    #[test]
    fn recent_assets_handles_short_batches() {
        let assets = vec![asset("only")];
        assert_eq!(recent_assets(&assets).len(), 1);
        assert!(recent_assets(&[]).is_empty());
    }

    #[test]
    fn letter_spaced_text_is_collapsed() {
        assert_eq!(
            collapse_letter_spacing("U S E R  A C C O U N T"),
            "USER ACCOUNT"
        );
        assert_eq!(
            collapse_letter_spacing("R e d e s i g n  o f  L o g i n"),
            "Redesign of Login"
        );
    }

    #[test]
    fn normal_prose_is_untouched() {
        let text = "A redesign of the login flow reduced drop-off by 12%.";
        assert_eq!(collapse_letter_spacing(text), text);
        // Short strings never trigger the heuristic.
        assert_eq!(collapse_letter_spacing("I am"), "I am");
        // Occasional single-character words don't either.
        let mixed = "version 2 of the x y chart renderer";
        assert_eq!(collapse_letter_spacing(mixed), mixed);
    }

    #[test]
    fn sanitize_applies_to_all_narrative_fields() {
        let narrative = NarrativeResult {
            title: Some("N E W  F L O W".to_string()),
            problem: Some("Slow login".to_string()),
            ..Default::default()
        };
        let clean = sanitize_narrative(narrative);
        assert_eq!(clean.title.as_deref(), Some("NEW FLOW"));
        assert_eq!(clean.problem.as_deref(), Some("Slow login"));
    }

    #[test]
    fn schema_covers_every_narrative_field() {
        let schema = narrative_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 7);
        assert!(schema["properties"]["seoMetadata"]["properties"]
            .get("keywords")
            .is_some());
    }
}
