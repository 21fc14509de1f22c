//! Settings persistence
//!
//! Key-value settings table holding the AI API key (authoritative
//! source; ENV and TOML are fallbacks) and the user preferences blob.

use sqlx::SqlitePool;

use dossier_common::{Error, Result};

use crate::models::UserPreferences;

const KEY_GEMINI_API_KEY: &str = "gemini_api_key";
const KEY_PREFERENCES: &str = "preferences";

/// Read a raw setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// Write a raw setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_gemini_api_key(pool: &SqlitePool) -> Result<Option<String>> {
    get_setting(pool, KEY_GEMINI_API_KEY).await
}

pub async fn set_gemini_api_key(pool: &SqlitePool, key: String) -> Result<()> {
    set_setting(pool, KEY_GEMINI_API_KEY, &key).await
}

/// Load preferences, defaulting when never saved
pub async fn get_preferences(pool: &SqlitePool) -> Result<UserPreferences> {
    match get_setting(pool, KEY_PREFERENCES).await? {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| Error::Internal(format!("Failed to deserialize preferences: {}", e))),
        None => Ok(UserPreferences::default()),
    }
}

pub async fn set_preferences(pool: &SqlitePool, preferences: &UserPreferences) -> Result<()> {
    let json = serde_json::to_string(preferences)
        .map_err(|e| Error::Internal(format!("Failed to serialize preferences: {}", e)))?;
    set_setting(pool, KEY_PREFERENCES, &json).await
}
