//! User preferences
//!
//! Persisted in the settings table and mirrored into the local cache
//! snapshot on every change.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub theme: Theme,
    /// When false, ingestion skips AI analysis and `ai_name` stays
    /// equal to the original file name
    pub auto_rename: bool,
    pub export_format: ExportFormat,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            auto_rename: true,
            export_format: ExportFormat::Markdown,
        }
    }
}
