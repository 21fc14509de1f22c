//! Case study model
//!
//! A synthesized narrative document referencing a snapshot of assets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::Asset;

/// Placeholder text substituted when the synthesis result omits a
/// narrative field. The UI contract is that no narrative text is ever
/// missing, so these are all non-empty.
pub const DEFAULT_TITLE: &str = "UNTITLED CONTRIBUTION";
pub const DEFAULT_PROBLEM: &str = "No problem statement provided.";
pub const DEFAULT_APPROACH: &str = "Standard implementation.";
pub const DEFAULT_OUTCOME: &str = "Awaiting outcome analysis.";
pub const DEFAULT_NEXT_STEPS: &str = "Review and iterate.";
pub const DEFAULT_TAG: &str = "LOG";

/// Publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyStatus {
    Draft,
    Published,
    Archived,
}

/// Persistence reconciliation state
///
/// Tagged explicitly rather than inferred from the identifier format at
/// every read site. `SyncFailed` marks a study that is visible locally
/// but whose last save attempt failed; the next save retries the insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Local,
    Synced,
    SyncFailed,
}

/// SEO metadata block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoMetadata {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

/// One draft or published narrative unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStudy {
    /// Local token initially; canonical UUID once persisted
    pub id: String,
    pub title: String,
    pub status: StudyStatus,
    pub date: DateTime<Utc>,
    pub tags: Vec<String>,
    pub problem: String,
    pub approach: String,
    /// Embedded copy of the assets the study was generated from.
    /// A snapshot, not a live reference: later staging edits do not
    /// retroactively change a study.
    pub artifacts: Vec<Asset>,
    pub outcome: String,
    pub next_steps: String,
    pub seo_metadata: SeoMetadata,
    pub sync_state: SyncState,
}

/// Structured narrative returned by the synthesizer
///
/// Field names follow the model's response keys; every field is
/// optional and [`CaseStudy::from_narrative`] owns the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeResult {
    pub title: Option<String>,
    pub problem: Option<String>,
    pub approach: Option<String>,
    pub outcome: Option<String>,
    #[serde(rename = "nextSteps")]
    pub next_steps: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(rename = "seoMetadata")]
    pub seo_metadata: Option<SeoMetadata>,
}

impl CaseStudy {
    /// Assemble a draft study from a synthesis result and the staged
    /// asset snapshot, substituting placeholders for anything the
    /// narrative omitted.
    pub fn from_narrative(narrative: NarrativeResult, artifacts: Vec<Asset>) -> Self {
        let non_empty = |value: Option<String>, fallback: &str| -> String {
            match value {
                Some(v) if !v.trim().is_empty() => v,
                _ => fallback.to_string(),
            }
        };

        Self {
            id: dossier_common::ids::local_token(),
            title: non_empty(narrative.title, DEFAULT_TITLE),
            status: StudyStatus::Draft,
            date: Utc::now(),
            tags: match narrative.tags {
                Some(tags) if !tags.is_empty() => tags,
                _ => vec![DEFAULT_TAG.to_string()],
            },
            problem: non_empty(narrative.problem, DEFAULT_PROBLEM),
            approach: non_empty(narrative.approach, DEFAULT_APPROACH),
            artifacts,
            outcome: non_empty(narrative.outcome, DEFAULT_OUTCOME),
            next_steps: non_empty(narrative.next_steps, DEFAULT_NEXT_STEPS),
            seo_metadata: narrative.seo_metadata.unwrap_or_default(),
            sync_state: SyncState::Local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_narrative_gets_placeholders_everywhere() {
        let study = CaseStudy::from_narrative(NarrativeResult::default(), Vec::new());

        assert_eq!(study.title, DEFAULT_TITLE);
        assert_eq!(study.problem, DEFAULT_PROBLEM);
        assert_eq!(study.approach, DEFAULT_APPROACH);
        assert_eq!(study.outcome, DEFAULT_OUTCOME);
        assert_eq!(study.next_steps, DEFAULT_NEXT_STEPS);
        assert_eq!(study.tags, vec![DEFAULT_TAG.to_string()]);
        assert_eq!(study.status, StudyStatus::Draft);
        assert_eq!(study.sync_state, SyncState::Local);
        assert!(!study.id.is_empty());
    }

    #[test]
    fn whitespace_only_fields_count_as_missing() {
        let narrative = NarrativeResult {
            title: Some("  ".to_string()),
            problem: Some("Real problem".to_string()),
            ..Default::default()
        };
        let study = CaseStudy::from_narrative(narrative, Vec::new());
        assert_eq!(study.title, DEFAULT_TITLE);
        assert_eq!(study.problem, "Real problem");
    }

    #[test]
    fn narrative_deserializes_model_response_keys() {
        let narrative: NarrativeResult = serde_json::from_str(
            r#"{
                "title": "Auth revamp",
                "problem": "Slow login",
                "approach": "Token caching",
                "outcome": "Faster login",
                "nextSteps": "Roll out",
                "tags": ["auth", "perf"],
                "seoMetadata": {"title": "Auth", "description": "d", "keywords": ["k"]}
            }"#,
        )
        .unwrap();
        assert_eq!(narrative.next_steps.as_deref(), Some("Roll out"));
        assert_eq!(narrative.seo_metadata.unwrap().keywords, vec!["k"]);
    }

    #[test]
    fn provided_fields_are_preserved() {
        let narrative = NarrativeResult {
            title: Some("Title".to_string()),
            tags: Some(vec!["a".to_string(), "b".to_string()]),
            ..Default::default()
        };
        let study = CaseStudy::from_narrative(narrative, Vec::new());
        assert_eq!(study.title, "Title");
        assert_eq!(study.tags, vec!["a".to_string(), "b".to_string()]);
    }
}
