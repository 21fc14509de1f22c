//! Case-study persistence reconciler
//!
//! Upserts a study and its asset children, promotes transient blob
//! references to durable storage, and hands back server-shaped records
//! so the caller can rewrite identifiers and URLs in memory.
//!
//! Insert-vs-update is decided by identifier format: a locally
//! generated token is always an insert and is never sent to the store
//! as an update target. Child rows are replaced wholesale on every save
//! so the store exactly mirrors client state — write amplification
//! traded for the absence of diff bugs.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use dossier_common::{ids, Error, Result};

use crate::models::{Asset, CaseStudy, SeoMetadata, StudyStatus, SyncState};
use crate::storage::{is_transient, BlobCache, BlobStore};

/// Server-shaped asset row returned from a save
#[derive(Debug, Clone)]
pub struct SavedAsset {
    pub id: String,
    pub case_study_id: String,
    pub original_name: String,
    pub ai_name: String,
    pub kind: String,
    pub topic: String,
    pub context: String,
    pub variant: String,
    pub version: String,
    pub file_type: String,
    pub url: String,
    pub size: u64,
}

/// Server-shaped study record returned from a save
#[derive(Debug, Clone)]
pub struct SavedStudy {
    pub id: String,
    pub title: String,
    pub status: StudyStatus,
    pub created_at: DateTime<Utc>,
    pub assets: Vec<SavedAsset>,
}

/// Upsert a case study and replace its asset children
///
/// Every asset whose `url` is a transient reference has its bytes
/// fetched from the blob cache and uploaded to durable storage under
/// `{study_id}/{ai_name}`. A failed upload fails the whole save —
/// transient references do not survive a reload, so persisting one
/// would leave a broken record.
pub async fn save_case_study(
    pool: &SqlitePool,
    blob_cache: &BlobCache,
    blob_store: &BlobStore,
    study: &CaseStudy,
    assets: &[Asset],
) -> Result<SavedStudy> {
    // Local tokens are never update targets; the store keys new rows.
    let updating = ids::is_canonical_uuid(&study.id);
    let server_id = if updating {
        study.id.clone()
    } else {
        Uuid::new_v4().to_string()
    };

    let status = serde_json::to_value(study.status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "draft".to_string());
    let tags = serde_json::to_string(&study.tags)
        .map_err(|e| Error::Internal(format!("Failed to serialize tags: {}", e)))?;
    let seo_metadata = serde_json::to_string(&study.seo_metadata)
        .map_err(|e| Error::Internal(format!("Failed to serialize seo metadata: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO case_studies (
            id, title, status, problem, approach, outcome, next_steps,
            tags, seo_metadata, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            status = excluded.status,
            problem = excluded.problem,
            approach = excluded.approach,
            outcome = excluded.outcome,
            next_steps = excluded.next_steps,
            tags = excluded.tags,
            seo_metadata = excluded.seo_metadata
        "#,
    )
    .bind(&server_id)
    .bind(&study.title)
    .bind(&status)
    .bind(&study.problem)
    .bind(&study.approach)
    .bind(&study.outcome)
    .bind(&study.next_steps)
    .bind(&tags)
    .bind(&seo_metadata)
    .bind(study.date.to_rfc3339())
    .execute(pool)
    .await?;

    // Replace-all children: delete previous rows, re-insert the
    // current set so server rows exactly mirror client state.
    if updating {
        sqlx::query("DELETE FROM assets WHERE case_study_id = ?")
            .bind(&server_id)
            .execute(pool)
            .await?;
    }

    let mut saved_assets = Vec::with_capacity(assets.len());

    for asset in assets {
        let url = promote_url(blob_cache, blob_store, &server_id, asset)?;

        let row_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO assets (
                id, case_study_id, original_name, ai_name, type,
                topic, context, variant, version, file_type, url, size
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row_id)
        .bind(&server_id)
        .bind(&asset.original_name)
        .bind(&asset.ai_name)
        .bind(&asset.kind)
        .bind(&asset.topic)
        .bind(&asset.context)
        .bind(&asset.variant)
        .bind(&asset.version)
        .bind(&asset.file_type)
        .bind(&url)
        .bind(asset.size as i64)
        .execute(pool)
        .await?;

        saved_assets.push(SavedAsset {
            id: row_id,
            case_study_id: server_id.clone(),
            original_name: asset.original_name.clone(),
            ai_name: asset.ai_name.clone(),
            kind: asset.kind.clone(),
            topic: asset.topic.clone(),
            context: asset.context.clone(),
            variant: asset.variant.clone(),
            version: asset.version.clone(),
            file_type: asset.file_type.clone(),
            url,
            size: asset.size,
        });
    }

    tracing::info!(
        study_id = %server_id,
        assets = saved_assets.len(),
        updating = updating,
        "Case study saved"
    );

    Ok(SavedStudy {
        id: server_id,
        title: study.title.clone(),
        status: study.status,
        created_at: study.date,
        assets: saved_assets,
    })
}

/// Durable URL for one asset: uploads transient blobs, passes durable
/// and empty references through
fn promote_url(
    blob_cache: &BlobCache,
    blob_store: &BlobStore,
    server_id: &str,
    asset: &Asset,
) -> Result<String> {
    if !is_transient(&asset.url) {
        return Ok(asset.url.clone());
    }

    let bytes = blob_cache.get(&asset.url).ok_or_else(|| {
        Error::NotFound(format!(
            "Transient blob for {} is no longer available",
            asset.ai_name
        ))
    })?;

    blob_store.put(server_id, &asset.ai_name, &bytes)
}

/// Rewrite an in-memory study with server-assigned identifiers and
/// durable URLs after a successful save
pub fn apply_saved(study: &mut CaseStudy, saved: &SavedStudy) {
    study.id = saved.id.clone();
    study.sync_state = SyncState::Synced;
    for artifact in &mut study.artifacts {
        if let Some(row) = saved.assets.iter().find(|a| a.ai_name == artifact.ai_name) {
            artifact.url = row.url.clone();
        }
    }
}

/// Read path: studies joined with their asset children, newest first
pub async fn list_case_studies(pool: &SqlitePool) -> Result<Vec<CaseStudy>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, status, problem, approach, outcome, next_steps,
               tags, seo_metadata, created_at
        FROM case_studies
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut studies = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.get("id");

        let status: String = row.get("status");
        let status: StudyStatus = serde_json::from_value(serde_json::Value::String(status))
            .map_err(|e| Error::Internal(format!("Failed to parse status: {}", e)))?;

        let tags: String = row.get("tags");
        let tags: Vec<String> = serde_json::from_str(&tags)
            .map_err(|e| Error::Internal(format!("Failed to parse tags: {}", e)))?;

        let seo_metadata: String = row.get("seo_metadata");
        let seo_metadata: SeoMetadata = serde_json::from_str(&seo_metadata).unwrap_or_default();

        let created_at: String = row.get("created_at");
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
            .with_timezone(&Utc);

        let artifacts = load_study_assets(pool, &id).await?;

        studies.push(CaseStudy {
            id,
            title: row.get("title"),
            status,
            date: created_at,
            tags,
            problem: row.get("problem"),
            approach: row.get("approach"),
            artifacts,
            outcome: row.get("outcome"),
            next_steps: row.get("next_steps"),
            seo_metadata,
            sync_state: SyncState::Synced,
        });
    }

    Ok(studies)
}

async fn load_study_assets(pool: &SqlitePool, case_study_id: &str) -> Result<Vec<Asset>> {
    let rows = sqlx::query(
        r#"
        SELECT id, original_name, ai_name, type, topic, context,
               variant, version, file_type, url, size
        FROM assets
        WHERE case_study_id = ?
        "#,
    )
    .bind(case_study_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Asset {
            id: row.get("id"),
            original_name: row.get("original_name"),
            ai_name: row.get("ai_name"),
            kind: row.get("type"),
            topic: row.get("topic"),
            context: row.get("context"),
            variant: row.get("variant"),
            version: row.get("version"),
            file_type: row.get("file_type"),
            url: row.get("url"),
            size: row.get::<i64, _>("size") as u64,
        })
        .collect())
}
