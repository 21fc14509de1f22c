//! Settings API handlers
//!
//! GET/PUT /settings/preferences, PUT /settings/api-key

use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ApiError, ApiResult};
use crate::models::UserPreferences;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ApiKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub saved: bool,
}

/// GET /settings/preferences
pub async fn get_preferences(
    State(state): State<AppState>,
) -> ApiResult<Json<UserPreferences>> {
    let preferences = crate::db::settings::get_preferences(&state.db).await?;
    Ok(Json(preferences))
}

/// PUT /settings/preferences
pub async fn put_preferences(
    State(state): State<AppState>,
    Json(preferences): Json<UserPreferences>,
) -> ApiResult<Json<UserPreferences>> {
    crate::db::settings::set_preferences(&state.db, &preferences).await?;
    state.cache.set_preferences(preferences.clone());
    tracing::info!("Preferences updated");
    Ok(Json(preferences))
}

/// PUT /settings/api-key
///
/// The database is the authoritative store; the TOML file gets a
/// best-effort backup copy.
pub async fn put_api_key(
    State(state): State<AppState>,
    Json(request): Json<ApiKeyRequest>,
) -> ApiResult<Json<ApiKeyResponse>> {
    if !crate::config::is_valid_key(&request.api_key) {
        return Err(ApiError::BadRequest("API key must be non-empty".to_string()));
    }

    crate::db::settings::set_gemini_api_key(&state.db, request.api_key.clone()).await?;

    let mut settings = HashMap::new();
    settings.insert("gemini_api_key".to_string(), request.api_key);
    let toml_path = dossier_common::config::default_config_path("dossier-ingest");
    crate::config::sync_settings_to_toml(settings, &toml_path).await?;

    Ok(Json(ApiKeyResponse { saved: true }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/settings/preferences",
            get(get_preferences).put(put_preferences),
        )
        .route("/settings/api-key", put(put_api_key))
}
