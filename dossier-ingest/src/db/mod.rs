//! Database access for dossier-ingest
//!
//! SQLite-backed record store: case studies with embedded asset rows,
//! workflow session persistence, and a key-value settings table.

pub mod sessions;
pub mod settings;
pub mod studies;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize service tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workflow_sessions (
            session_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            progress_current INTEGER NOT NULL DEFAULT 0,
            progress_total INTEGER NOT NULL DEFAULT 0,
            progress_percentage REAL NOT NULL DEFAULT 0.0,
            current_operation TEXT NOT NULL DEFAULT '',
            errors TEXT NOT NULL DEFAULT '[]',
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS case_studies (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'draft',
            problem TEXT NOT NULL DEFAULT '',
            approach TEXT NOT NULL DEFAULT '',
            outcome TEXT NOT NULL DEFAULT '',
            next_steps TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]',
            seo_metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assets (
            id TEXT PRIMARY KEY,
            case_study_id TEXT NOT NULL REFERENCES case_studies(id) ON DELETE CASCADE,
            original_name TEXT NOT NULL,
            ai_name TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'file',
            topic TEXT NOT NULL DEFAULT 'misc',
            context TEXT NOT NULL DEFAULT 'dev',
            variant TEXT NOT NULL DEFAULT 'v1',
            version TEXT NOT NULL DEFAULT '1.0',
            file_type TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL DEFAULT '',
            size INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (settings, workflow_sessions, case_studies, assets)");

    Ok(())
}
