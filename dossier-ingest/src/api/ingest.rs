//! Ingest workflow API handlers
//!
//! POST /ingest/upload, POST /ingest/synthesize,
//! GET /ingest/status/:session_id, POST /ingest/cancel/:session_id,
//! plus staging-review endpoints.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    Asset, SessionError, UserRole, WorkflowProgress, WorkflowSession, WorkflowState,
};
use crate::services::{AssetAnalyzer, GeminiClient, StudySynthesizer};
use crate::workflow::{UploadOrchestrator, UploadedFile};
use crate::AppState;

/// Context hint used when the caller does not provide one
const DEFAULT_CONTEXT_HINT: &str = "Synthesize recent progress into a technical log.";

/// One file in an upload request; content travels base64-encoded
#[derive(Debug, Deserialize)]
pub struct UploadFileSpec {
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    pub data_base64: String,
}

/// POST /ingest/upload request
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub role: UserRole,
    #[serde(default)]
    pub use_enhanced: bool,
    pub files: Vec<UploadFileSpec>,
}

/// POST /ingest/synthesize request
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub role: UserRole,
    #[serde(default)]
    pub use_enhanced: bool,
    pub context_hint: Option<String>,
}

/// Workflow-start response
#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub state: WorkflowState,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// GET /ingest/status response
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: Uuid,
    pub state: WorkflowState,
    pub progress: WorkflowProgress,
    pub errors: Vec<SessionError>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// POST /ingest/cancel response
#[derive(Debug, Serialize)]
pub struct CancelSessionResponse {
    pub session_id: Uuid,
    pub cancellation_requested: bool,
}

#[derive(Debug, Serialize)]
pub struct StagedAssetsResponse {
    pub assets: Vec<Asset>,
}

/// POST /ingest/upload
///
/// Begin an ingest session. The work runs in a background task; the
/// response carries the session id for status polling and SSE
/// correlation.
pub async fn start_upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<Json<StartSessionResponse>> {
    if !request.role.can_publish() {
        return Err(ApiError::Forbidden(
            "Only publishers may upload artifacts".to_string(),
        ));
    }
    if request.files.is_empty() {
        return Err(ApiError::BadRequest("No files provided".to_string()));
    }

    // One workflow at a time by construction; reject, don't queue.
    if crate::db::sessions::has_running_session(&state.db).await? {
        return Err(ApiError::Conflict("Workflow already running".to_string()));
    }

    let mut files = Vec::with_capacity(request.files.len());
    for spec in request.files {
        let bytes = STANDARD.decode(spec.data_base64.as_bytes()).map_err(|e| {
            ApiError::BadRequest(format!("Invalid base64 content for {}: {}", spec.name, e))
        })?;
        files.push(UploadedFile {
            name: spec.name,
            mime_type: spec.mime_type,
            bytes,
        });
    }

    let preferences = crate::db::settings::get_preferences(&state.db).await?;

    let session = WorkflowSession::new(WorkflowState::Analyzing);
    let response = StartSessionResponse {
        session_id: session.session_id,
        state: session.state,
        started_at: session.started_at,
    };
    crate::db::sessions::save_session(&state.db, &session).await?;

    let cancel = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(session.session_id, cancel.clone());

    tracing::info!(
        session_id = %response.session_id,
        files = files.len(),
        "Ingest session started"
    );

    let use_enhanced = request.use_enhanced;
    let auto_rename = preferences.auto_rename;
    let role = request.role;
    let state_clone = state.clone();
    tokio::spawn(async move {
        let session_id = session.session_id;
        match build_orchestrator(&state_clone).await {
            Ok(orchestrator) => {
                if let Err(e) = orchestrator
                    .ingest_batch(role, files, use_enhanced, auto_rename, session, cancel)
                    .await
                {
                    tracing::error!(session_id = %session_id, error = %e, "Ingest workflow failed");
                }
            }
            Err(e) => {
                fail_session(&state_clone, session, &e.to_string()).await;
            }
        }
        state_clone
            .cancellation_tokens
            .write()
            .await
            .remove(&session_id);
    });

    Ok(Json(response))
}

/// POST /ingest/synthesize
///
/// Generate a case study from the staged assets.
pub async fn start_synthesis(
    State(state): State<AppState>,
    Json(request): Json<SynthesizeRequest>,
) -> ApiResult<Json<StartSessionResponse>> {
    if !request.role.can_publish() {
        return Err(ApiError::Forbidden(
            "Only publishers may create case studies".to_string(),
        ));
    }
    if state.staging.read().await.is_empty() {
        return Err(ApiError::BadRequest(
            "No staged assets to synthesize".to_string(),
        ));
    }
    if crate::db::sessions::has_running_session(&state.db).await? {
        return Err(ApiError::Conflict("Workflow already running".to_string()));
    }

    let session = WorkflowSession::new(WorkflowState::Generating);
    let response = StartSessionResponse {
        session_id: session.session_id,
        state: session.state,
        started_at: session.started_at,
    };
    crate::db::sessions::save_session(&state.db, &session).await?;

    let cancel = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(session.session_id, cancel.clone());

    let context_hint = request
        .context_hint
        .unwrap_or_else(|| DEFAULT_CONTEXT_HINT.to_string());
    let use_enhanced = request.use_enhanced;
    let role = request.role;
    let state_clone = state.clone();
    tokio::spawn(async move {
        let session_id = session.session_id;
        match build_orchestrator(&state_clone).await {
            Ok(orchestrator) => {
                if let Err(e) = orchestrator
                    .synthesize_study(role, &context_hint, use_enhanced, session, cancel)
                    .await
                {
                    tracing::error!(session_id = %session_id, error = %e, "Synthesis workflow failed");
                }
            }
            Err(e) => {
                fail_session(&state_clone, session, &e.to_string()).await;
            }
        }
        state_clone
            .cancellation_tokens
            .write()
            .await
            .remove(&session_id);
    });

    Ok(Json(response))
}

/// GET /ingest/status/:session_id
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionStatusResponse>> {
    let session = crate::db::sessions::load_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow session not found: {}", session_id)))?;

    Ok(Json(SessionStatusResponse {
        session_id: session.session_id,
        state: session.state,
        progress: session.progress,
        errors: session.errors,
        started_at: session.started_at,
        ended_at: session.ended_at,
    }))
}

/// POST /ingest/cancel/:session_id
///
/// Cancellation is cooperative: the workflow notices the token at its
/// next checkpoint and winds down with no partial writes.
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<CancelSessionResponse>> {
    if let Some(token) = state.cancellation_tokens.read().await.get(&session_id) {
        token.cancel();
        tracing::info!(session_id = %session_id, "Cancellation requested");
        return Ok(Json(CancelSessionResponse {
            session_id,
            cancellation_requested: true,
        }));
    }

    // No live token: either an unknown session or a stale one from a
    // previous process. Stale sessions are closed out directly.
    let mut session = crate::db::sessions::load_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow session not found: {}", session_id)))?;

    if session.is_terminal() {
        return Err(ApiError::BadRequest(format!(
            "Workflow session already in terminal state: {:?}",
            session.state
        )));
    }

    session.transition_to(WorkflowState::Cancelled);
    crate::db::sessions::save_session(&state.db, &session).await?;

    Ok(Json(CancelSessionResponse {
        session_id,
        cancellation_requested: true,
    }))
}

/// GET /ingest/assets - current staging collection
pub async fn list_staged(State(state): State<AppState>) -> Json<StagedAssetsResponse> {
    Json(StagedAssetsResponse {
        assets: state.staged_assets().await,
    })
}

/// DELETE /ingest/assets/:asset_id
pub async fn remove_staged(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> ApiResult<Json<StagedAssetsResponse>> {
    if !state.remove_staged(&asset_id).await {
        return Err(ApiError::NotFound(format!(
            "Staged asset not found: {}",
            asset_id
        )));
    }
    Ok(Json(StagedAssetsResponse {
        assets: state.staged_assets().await,
    }))
}

/// DELETE /ingest/assets
pub async fn clear_staged(State(state): State<AppState>) -> Json<StagedAssetsResponse> {
    state.clear_staged().await;
    Json(StagedAssetsResponse { assets: Vec::new() })
}

/// Wire real AI adapters to the shared state. Fails when no API key is
/// configured anywhere.
async fn build_orchestrator(state: &AppState) -> dossier_common::Result<UploadOrchestrator> {
    let api_key = crate::config::resolve_gemini_api_key(&state.db, &state.toml_config).await?;

    let analyzer_client = GeminiClient::new(api_key.clone())
        .map_err(|e| dossier_common::Error::External(e.to_string()))?;
    let synthesizer_client = GeminiClient::new(api_key)
        .map_err(|e| dossier_common::Error::External(e.to_string()))?;

    Ok(state.orchestrator(
        Arc::new(AssetAnalyzer::new(analyzer_client)),
        Arc::new(StudySynthesizer::new(synthesizer_client)),
    ))
}

/// Mark a session failed before its workflow ever ran
async fn fail_session(state: &AppState, mut session: WorkflowSession, message: &str) {
    tracing::error!(session_id = %session.session_id, error = message, "Workflow could not start");
    session.transition_to(WorkflowState::Failed);
    session.progress.current_operation = message.to_string();
    if let Err(e) = crate::db::sessions::save_session(&state.db, &session).await {
        tracing::error!(session_id = %session.session_id, error = %e, "Failed to persist failed session");
    }
    state.event_bus.emit(
        dossier_common::events::DossierEvent::SessionFailed {
            session_id: session.session_id,
            error: message.to_string(),
            timestamp: chrono::Utc::now(),
        },
    );
}

/// Build ingest workflow routes
pub fn ingest_routes() -> Router<AppState> {
    Router::new()
        .route("/ingest/upload", post(start_upload))
        .route("/ingest/synthesize", post(start_synthesis))
        .route("/ingest/status/:session_id", get(get_session_status))
        .route("/ingest/cancel/:session_id", post(cancel_session))
        .route("/ingest/assets", get(list_staged).delete(clear_staged))
        .route("/ingest/assets/:asset_id", delete(remove_staged))
}
