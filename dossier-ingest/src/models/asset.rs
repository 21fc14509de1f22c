//! Asset model
//!
//! One ingested artifact plus the semantic metadata derived for it.

use serde::{Deserialize, Serialize};

/// Fallback values substituted when analysis is skipped or incomplete.
/// Asset creation never blocks on analysis, so every semantic field has
/// a stable default.
pub const FALLBACK_TOPIC: &str = "misc";
pub const FALLBACK_KIND: &str = "file";
pub const FALLBACK_CONTEXT: &str = "dev";
pub const FALLBACK_VARIANT: &str = "v1";
pub const FALLBACK_VERSION: &str = "1.0";

/// One ingested artifact
///
/// `id` is a local base-36 token until the record is persisted. `url`
/// is a transient `mem:` reference, a durable `/files/...` path, or
/// empty when no preview exists (oversized or archive-typed input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub original_name: String,
    /// Derived display slug; doubles as the durable-storage path key
    pub ai_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub topic: String,
    pub context: String,
    pub variant: String,
    pub version: String,
    /// File extension
    pub file_type: String,
    pub url: String,
    /// Size in bytes
    pub size: u64,
}

/// Extensions rendered inline as images
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
/// Extensions rendered inline as video
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

/// How the presentation layer should render an asset's preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Image,
    Video,
    /// Opaque icon, no inline preview
    Icon,
}

impl Asset {
    /// Preview classification from the file extension. An asset with an
    /// empty `url` renders as an icon regardless.
    pub fn preview_kind(&self) -> PreviewKind {
        let ext = self.file_type.to_ascii_lowercase();
        if self.url.is_empty() {
            PreviewKind::Icon
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            PreviewKind::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            PreviewKind::Video
        } else {
            PreviewKind::Icon
        }
    }
}

/// Raw semantic fields returned by the analyzer
///
/// All fields are optional: the analyzer never fabricates values, and
/// the assembler owns fallback substitution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub topic: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub context: Option<String>,
    pub variant: Option<String>,
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_result_deserializes_partial_payloads() {
        let result: AnalysisResult =
            serde_json::from_str(r#"{"topic": "auth", "type": "diagram"}"#).unwrap();
        assert_eq!(result.topic.as_deref(), Some("auth"));
        assert_eq!(result.kind.as_deref(), Some("diagram"));
        assert!(result.context.is_none());
        assert!(result.variant.is_none());
        assert!(result.version.is_none());
    }

    fn sample(file_type: &str, url: &str) -> Asset {
        Asset {
            id: "abc123def".to_string(),
            original_name: format!("file.{file_type}"),
            ai_name: format!("misc-file-dev-v1-1.0-{file_type}"),
            kind: "file".to_string(),
            topic: "misc".to_string(),
            context: "dev".to_string(),
            variant: "v1".to_string(),
            version: "1.0".to_string(),
            file_type: file_type.to_string(),
            url: url.to_string(),
            size: 1,
        }
    }

    #[test]
    fn preview_kind_classification() {
        assert_eq!(sample("png", "mem:abc").preview_kind(), PreviewKind::Image);
        assert_eq!(sample("JPG", "mem:abc").preview_kind(), PreviewKind::Image);
        assert_eq!(sample("mp4", "/files/x/y").preview_kind(), PreviewKind::Video);
        assert_eq!(sample("pdf", "mem:abc").preview_kind(), PreviewKind::Icon);
        // No preview reference means no inline rendering.
        assert_eq!(sample("png", "").preview_kind(), PreviewKind::Icon);
    }

    #[test]
    fn asset_kind_serializes_as_type() {
        let asset = Asset {
            id: "abc123def".to_string(),
            original_name: "logo.png".to_string(),
            ai_name: "brand-logo-dev-v1-1.0-png".to_string(),
            kind: "logo".to_string(),
            topic: "brand".to_string(),
            context: "dev".to_string(),
            variant: "v1".to_string(),
            version: "1.0".to_string(),
            file_type: "png".to_string(),
            url: String::new(),
            size: 512,
        };
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["type"], "logo");
        assert!(json.get("kind").is_none());
    }
}
