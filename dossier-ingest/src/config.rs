//! Configuration resolution for dossier-ingest
//!
//! Multi-tier resolution with Database → ENV → TOML priority for the
//! Gemini API key. The database is authoritative; the other tiers exist
//! so a fresh install can start from an environment variable or a
//! config file.

use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use dossier_common::config::TomlConfig;
use dossier_common::{Error, Result};

/// Environment variable carrying the Gemini API key
pub const GEMINI_API_KEY_ENV: &str = "DOSSIER_GEMINI_API_KEY";

/// Resolve the Gemini API key from 3-tier configuration
///
/// Priority: Database → ENV → TOML
pub async fn resolve_gemini_api_key(db: &SqlitePool, toml_config: &TomlConfig) -> Result<String> {
    let mut sources = Vec::new();

    let db_key = crate::db::settings::get_gemini_api_key(db).await?;
    if db_key.as_deref().is_some_and(is_valid_key) {
        sources.push("database");
    }

    let env_key = std::env::var(GEMINI_API_KEY_ENV).ok();
    if env_key.as_deref().is_some_and(is_valid_key) {
        sources.push("environment");
    }

    let toml_key = toml_config.gemini_api_key.as_ref();
    if toml_key.map(|k| is_valid_key(k)).unwrap_or(false) {
        sources.push("TOML");
    }

    // Multiple sources usually mean a stale leftover somewhere.
    if sources.len() > 1 {
        warn!(
            "Gemini API key found in multiple sources: {}. Using database (highest priority).",
            sources.join(", ")
        );
    }

    if let Some(key) = db_key {
        if is_valid_key(&key) {
            info!("Gemini API key loaded from database");
            return Ok(key);
        }
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("Gemini API key loaded from environment variable");
            return Ok(key);
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("Gemini API key loaded from TOML config");
            return Ok(key.clone());
        }
    }

    Err(Error::Config(format!(
        "Gemini API key not configured. Please configure using one of:\n\
         1. API: PUT /settings/api-key\n\
         2. Environment: {}=your-key-here\n\
         3. TOML config: {} (gemini_api_key = \"your-key\")",
        GEMINI_API_KEY_ENV,
        dossier_common::config::default_config_path("dossier-ingest").display()
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Sync settings from the database to the TOML file (best-effort backup)
pub async fn sync_settings_to_toml(
    settings: HashMap<String, String>,
    toml_path: &Path,
) -> Result<()> {
    let mut config = dossier_common::config::load_toml_config(toml_path)?;

    if let Some(key) = settings.get("gemini_api_key") {
        config.gemini_api_key = Some(key.clone());
    }

    match dossier_common::config::write_toml_config(&config, toml_path) {
        Ok(()) => {
            info!("Settings synced to TOML: {}", toml_path.display());
            Ok(())
        }
        Err(e) => {
            warn!("TOML write failed (database write succeeded): {}", e);
            Ok(()) // Graceful degradation
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation() {
        assert!(is_valid_key("abc123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }
}
