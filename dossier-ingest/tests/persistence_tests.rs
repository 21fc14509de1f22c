//! Persistence reconciler integration tests
//!
//! Save/read round trips against in-memory SQLite with a temp-dir blob
//! store: insert-vs-update classification, child replacement, transient
//! blob promotion, and newest-first listing.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use dossier_common::ids::is_canonical_uuid;

use dossier_ingest::db::studies::{apply_saved, list_case_studies, save_case_study};
use dossier_ingest::models::{
    Asset, CaseStudy, NarrativeResult, SeoMetadata, StudyStatus, SyncState,
};
use dossier_ingest::storage::{BlobCache, BlobStore};

async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    dossier_ingest::db::init_tables(&pool).await.unwrap();
    pool
}

fn asset(name: &str, url: &str) -> Asset {
    Asset {
        id: dossier_common::ids::local_token(),
        original_name: name.to_string(),
        ai_name: format!("misc-file-dev-v1-1.0-{}", name),
        kind: "file".to_string(),
        topic: "misc".to_string(),
        context: "dev".to_string(),
        variant: "v1".to_string(),
        version: "1.0".to_string(),
        file_type: "md".to_string(),
        url: url.to_string(),
        size: 7,
    }
}

fn study_with(artifacts: Vec<Asset>) -> CaseStudy {
    let narrative = NarrativeResult {
        title: Some("Login redesign".to_string()),
        problem: Some("Drop-off at the login screen".to_string()),
        approach: Some("Progressive disclosure".to_string()),
        outcome: Some("12% fewer abandoned sessions".to_string()),
        next_steps: Some("A/B test the copy".to_string()),
        tags: Some(vec!["ux".to_string(), "auth".to_string()]),
        seo_metadata: Some(SeoMetadata {
            title: "Login redesign".to_string(),
            description: "A case study".to_string(),
            keywords: vec!["login".to_string()],
        }),
    };
    CaseStudy::from_narrative(narrative, artifacts)
}

#[tokio::test]
async fn local_id_is_always_an_insert() {
    let pool = pool().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let store = BlobStore::new(tmp.path().to_path_buf()).unwrap();
    let cache = BlobCache::new();

    let mut study = study_with(vec![asset("a.md", "")]);
    study.id = "a1b2c3".to_string(); // short local token, not a UUID

    let saved = save_case_study(&pool, &cache, &store, &study, &study.artifacts.clone())
        .await
        .unwrap();

    assert!(is_canonical_uuid(&saved.id));
    assert_ne!(saved.id, "a1b2c3");
    assert_eq!(saved.assets.len(), 1);

    let listed = list_case_studies(&pool).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, saved.id);
}

#[tokio::test]
async fn round_trip_preserves_narrative_fields_and_artifact_count() {
    let pool = pool().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let store = BlobStore::new(tmp.path().to_path_buf()).unwrap();
    let cache = BlobCache::new();

    let study = study_with(vec![asset("a.md", ""), asset("b.md", "")]);
    let saved = save_case_study(&pool, &cache, &store, &study, &study.artifacts.clone())
        .await
        .unwrap();

    let listed = list_case_studies(&pool).await.unwrap();
    assert_eq!(listed.len(), 1);
    let fetched = &listed[0];

    assert_eq!(fetched.title, study.title);
    assert_eq!(fetched.problem, study.problem);
    assert_eq!(fetched.approach, study.approach);
    assert_eq!(fetched.outcome, study.outcome);
    assert_eq!(fetched.next_steps, study.next_steps);
    assert_eq!(fetched.tags, study.tags);
    assert_eq!(fetched.seo_metadata, study.seo_metadata);
    assert_eq!(fetched.status, StudyStatus::Draft);
    assert_eq!(fetched.artifacts.len(), 2);
    assert_eq!(fetched.date.timestamp(), study.date.timestamp());
    assert_eq!(fetched.id, saved.id);
    assert_eq!(fetched.sync_state, SyncState::Synced);
}

#[tokio::test]
async fn update_replaces_all_children() {
    let pool = pool().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let store = BlobStore::new(tmp.path().to_path_buf()).unwrap();
    let cache = BlobCache::new();

    let mut study = study_with(vec![asset("a.md", ""), asset("b.md", ""), asset("c.md", "")]);
    let saved = save_case_study(&pool, &cache, &store, &study, &study.artifacts.clone())
        .await
        .unwrap();
    apply_saved(&mut study, &saved);
    assert!(is_canonical_uuid(&study.id));

    // Second save with a canonical id and a smaller artifact set.
    study.artifacts = vec![asset("only.md", "")];
    study.title = "Edited title".to_string();
    let resaved = save_case_study(&pool, &cache, &store, &study, &study.artifacts.clone())
        .await
        .unwrap();

    assert_eq!(resaved.id, saved.id);

    let listed = list_case_studies(&pool).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Edited title");
    // Children exactly mirror the latest client state.
    assert_eq!(listed[0].artifacts.len(), 1);
    assert_eq!(listed[0].artifacts[0].original_name, "only.md");
}

#[tokio::test]
async fn transient_blobs_are_promoted_to_durable_urls() {
    let pool = pool().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let store = BlobStore::new(tmp.path().join("assets")).unwrap();
    let cache = BlobCache::new();

    let url = cache.put(b"artifact bytes".to_vec());
    let study = study_with(vec![asset("preview.md", &url)]);

    let saved = save_case_study(&pool, &cache, &store, &study, &study.artifacts.clone())
        .await
        .unwrap();

    let durable = &saved.assets[0].url;
    assert!(durable.starts_with(&format!("/files/{}/", saved.id)));

    // The bytes landed on disk under {study_id}/{ai_name}.
    let on_disk = tmp
        .path()
        .join("assets")
        .join(&saved.id)
        .join(&saved.assets[0].ai_name);
    assert_eq!(std::fs::read(on_disk).unwrap(), b"artifact bytes");

    // The listed record carries the durable URL too.
    let listed = list_case_studies(&pool).await.unwrap();
    assert_eq!(listed[0].artifacts[0].url, *durable);
}

#[tokio::test]
async fn missing_transient_blob_fails_the_whole_save() {
    let pool = pool().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let store = BlobStore::new(tmp.path().to_path_buf()).unwrap();
    let cache = BlobCache::new();

    // A transient reference that is not in the cache (e.g. from a
    // previous process) cannot be promoted; keeping it would persist a
    // broken URL.
    let study = study_with(vec![asset("gone.md", "mem:deadbeef0")]);
    let result = save_case_study(&pool, &cache, &store, &study, &study.artifacts.clone()).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn listing_orders_newest_first() {
    let pool = pool().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let store = BlobStore::new(tmp.path().to_path_buf()).unwrap();
    let cache = BlobCache::new();

    let mut older = study_with(vec![]);
    older.date = chrono::Utc::now() - chrono::Duration::hours(2);
    older.title = "Older".to_string();
    let mut newer = study_with(vec![]);
    newer.title = "Newer".to_string();

    save_case_study(&pool, &cache, &store, &older, &[]).await.unwrap();
    save_case_study(&pool, &cache, &store, &newer, &[]).await.unwrap();

    let listed = list_case_studies(&pool).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].title, "Newer");
    assert_eq!(listed[1].title, "Older");
}

#[tokio::test]
async fn apply_saved_rewrites_id_and_urls_in_memory() {
    let pool = pool().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let store = BlobStore::new(tmp.path().to_path_buf()).unwrap();
    let cache = BlobCache::new();

    let url = cache.put(b"bytes".to_vec());
    let mut study = study_with(vec![asset("a.md", &url)]);
    let local_id = study.id.clone();

    let saved = save_case_study(&pool, &cache, &store, &study, &study.artifacts.clone())
        .await
        .unwrap();
    apply_saved(&mut study, &saved);

    assert_ne!(study.id, local_id);
    assert_eq!(study.sync_state, SyncState::Synced);
    assert!(study.artifacts[0].url.starts_with("/files/"));
}
