//! Asset assembly
//!
//! Turns a raw file plus an optional analysis result into a canonical
//! [`Asset`]. Fallback substitution for the five semantic fields lives
//! here, so asset creation never blocks on analysis.

use crate::models::asset::{
    AnalysisResult, Asset, FALLBACK_CONTEXT, FALLBACK_KIND, FALLBACK_TOPIC, FALLBACK_VARIANT,
    FALLBACK_VERSION,
};

/// Inline-preview size ceiling; larger inputs get no preview reference
pub const MAX_PREVIEW_BYTES: u64 = 30_000_000;

/// File extension, empty when the name has none
pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Derived display slug: the five semantic fields joined with the
/// extension. Deterministic given the inputs.
pub fn derive_ai_name(analysis: &AnalysisResult, extension: &str) -> String {
    format!(
        "{}-{}-{}-{}-{}-{}",
        field(&analysis.topic, FALLBACK_TOPIC),
        field(&analysis.kind, FALLBACK_KIND),
        field(&analysis.context, FALLBACK_CONTEXT),
        field(&analysis.variant, FALLBACK_VARIANT),
        field(&analysis.version, FALLBACK_VERSION),
        extension
    )
}

fn field(value: &Option<String>, fallback: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.clone(),
        _ => fallback.to_string(),
    }
}

/// Assemble the canonical asset record
///
/// With `auto_rename` off (or analysis skipped entirely), `ai_name`
/// stays equal to the original name. `url` is decided by the caller:
/// a transient preview reference or empty.
pub fn assemble(
    name: &str,
    size: u64,
    url: String,
    analysis: Option<AnalysisResult>,
    auto_rename: bool,
) -> Asset {
    let extension = file_extension(name);
    let analysis = analysis.unwrap_or_default();

    let ai_name = if auto_rename {
        derive_ai_name(&analysis, &extension)
    } else {
        name.to_string()
    };

    Asset {
        id: dossier_common::ids::local_token(),
        original_name: name.to_string(),
        ai_name,
        kind: field(&analysis.kind, FALLBACK_KIND),
        topic: field(&analysis.topic, FALLBACK_TOPIC),
        context: field(&analysis.context, FALLBACK_CONTEXT),
        variant: field(&analysis.variant, FALLBACK_VARIANT),
        version: field(&analysis.version, FALLBACK_VERSION),
        file_type: extension,
        url,
        size,
    }
}
