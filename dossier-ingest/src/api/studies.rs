//! Case study API handlers
//!
//! GET /studies, POST /studies/save, POST /studies/publish

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::studies::{apply_saved, list_case_studies, save_case_study};
use crate::error::{ApiError, ApiResult};
use crate::models::{CaseStudy, StudyStatus, UserRole};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StudyListResponse {
    pub studies: Vec<CaseStudy>,
    /// True when the list came from the local cache because the record
    /// store was empty or unreachable
    pub from_cache: bool,
}

#[derive(Debug, Deserialize)]
pub struct SaveStudyRequest {
    pub role: UserRole,
    pub case_study: CaseStudy,
}

/// GET /studies - studies joined with their assets, newest first
///
/// Falls back to the local cache snapshot when the store is empty or
/// unreachable, so a fresh session still shows the last known state.
pub async fn list_studies(State(state): State<AppState>) -> ApiResult<Json<StudyListResponse>> {
    match list_case_studies(&state.db).await {
        Ok(studies) if !studies.is_empty() => Ok(Json(StudyListResponse {
            studies,
            from_cache: false,
        })),
        Ok(_) => {
            let cached = state.cache.snapshot().case_studies;
            Ok(Json(StudyListResponse {
                studies: cached,
                from_cache: true,
            }))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Store read failed, serving cached studies");
            let cached = state.cache.snapshot().case_studies;
            Ok(Json(StudyListResponse {
                studies: cached,
                from_cache: true,
            }))
        }
    }
}

/// POST /studies/save - editor save
///
/// Full overwrite of the study's text fields. The embedded artifact
/// list is persisted alongside; identifiers and URLs in the response
/// reflect the reconciled server state.
pub async fn save_study(
    State(state): State<AppState>,
    Json(request): Json<SaveStudyRequest>,
) -> ApiResult<Json<CaseStudy>> {
    if !request.role.can_publish() {
        return Err(ApiError::Forbidden(
            "Only publishers may edit case studies".to_string(),
        ));
    }

    let mut study = request.case_study;
    let previous_id = study.id.clone();

    let saved = save_case_study(
        &state.db,
        &state.blob_cache,
        &state.blob_store,
        &study,
        &study.artifacts.clone(),
    )
    .await?;
    apply_saved(&mut study, &saved);

    state.cache.replace_study(&previous_id, &study);

    Ok(Json(study))
}

/// POST /studies/publish - status transition plus save
pub async fn publish_study(
    State(state): State<AppState>,
    Json(request): Json<SaveStudyRequest>,
) -> ApiResult<Json<CaseStudy>> {
    if !request.role.can_publish() {
        return Err(ApiError::Forbidden(
            "Only publishers may publish case studies".to_string(),
        ));
    }

    let mut study = request.case_study;
    study.status = StudyStatus::Published;
    let previous_id = study.id.clone();

    let saved = save_case_study(
        &state.db,
        &state.blob_cache,
        &state.blob_store,
        &study,
        &study.artifacts.clone(),
    )
    .await?;
    apply_saved(&mut study, &saved);

    state.cache.replace_study(&previous_id, &study);

    tracing::info!(study_id = %study.id, "Case study published");

    Ok(Json(study))
}

/// Build study routes
pub fn study_routes() -> Router<AppState> {
    Router::new()
        .route("/studies", get(list_studies))
        .route("/studies/save", post(save_study))
        .route("/studies/publish", post(publish_study))
}
