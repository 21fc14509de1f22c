//! Workflow session store tests

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use dossier_ingest::db::sessions::{
    cleanup_stale_sessions, has_running_session, load_session, save_session,
};
use dossier_ingest::models::{WorkflowSession, WorkflowState};

async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    dossier_ingest::db::init_tables(&pool).await.unwrap();
    pool
}

#[tokio::test]
async fn save_and_load_round_trip() {
    let pool = pool().await;

    let mut session = WorkflowSession::new(WorkflowState::Analyzing);
    session.update_progress(2, 5, "Analyzing readme.md".to_string());
    session.add_error("broken.png".to_string(), "analysis failed".to_string());
    save_session(&pool, &session).await.unwrap();

    let loaded = load_session(&pool, session.session_id)
        .await
        .unwrap()
        .expect("session should exist");

    assert_eq!(loaded.state, WorkflowState::Analyzing);
    assert_eq!(loaded.progress.current, 2);
    assert_eq!(loaded.progress.total, 5);
    assert_eq!(loaded.progress.percentage, 40.0);
    assert_eq!(loaded.progress.current_operation, "Analyzing readme.md");
    assert_eq!(loaded.errors.len(), 1);
    assert_eq!(loaded.errors[0].file_name, "broken.png");
    assert!(loaded.ended_at.is_none());
}

#[tokio::test]
async fn upsert_overwrites_previous_state() {
    let pool = pool().await;

    let mut session = WorkflowSession::new(WorkflowState::Generating);
    save_session(&pool, &session).await.unwrap();

    session.transition_to(WorkflowState::Completed);
    session.set_percentage(100.0, "Case study ready".to_string());
    save_session(&pool, &session).await.unwrap();

    let loaded = load_session(&pool, session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.state, WorkflowState::Completed);
    assert_eq!(loaded.progress.percentage, 100.0);
    assert!(loaded.ended_at.is_some());
}

#[tokio::test]
async fn running_session_detection() {
    let pool = pool().await;
    assert!(!has_running_session(&pool).await.unwrap());

    let mut session = WorkflowSession::new(WorkflowState::Analyzing);
    save_session(&pool, &session).await.unwrap();
    assert!(has_running_session(&pool).await.unwrap());

    session.transition_to(WorkflowState::Completed);
    save_session(&pool, &session).await.unwrap();
    assert!(!has_running_session(&pool).await.unwrap());
}

#[tokio::test]
async fn stale_sessions_are_cancelled_at_startup() {
    let pool = pool().await;

    let running = WorkflowSession::new(WorkflowState::Generating);
    save_session(&pool, &running).await.unwrap();

    let mut finished = WorkflowSession::new(WorkflowState::Analyzing);
    finished.transition_to(WorkflowState::Completed);
    save_session(&pool, &finished).await.unwrap();

    let cleaned = cleanup_stale_sessions(&pool).await.unwrap();
    assert_eq!(cleaned, 1);

    let reloaded = load_session(&pool, running.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.state, WorkflowState::Cancelled);

    let untouched = load_session(&pool, finished.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.state, WorkflowState::Completed);
}

#[tokio::test]
async fn unknown_session_loads_as_none() {
    let pool = pool().await;
    let missing = load_session(&pool, uuid::Uuid::new_v4()).await.unwrap();
    assert!(missing.is_none());
}
