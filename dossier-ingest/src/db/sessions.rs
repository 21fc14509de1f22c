//! Workflow session persistence
//!
//! Sessions are saved on every state or progress change so the UI can
//! restore progress after a reload and so stale sessions from a dead
//! process can be cleaned up at startup.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use dossier_common::{Error, Result};

use crate::models::{SessionError, WorkflowProgress, WorkflowSession, WorkflowState};

/// Save (upsert) a workflow session
pub async fn save_session(pool: &SqlitePool, session: &WorkflowSession) -> Result<()> {
    let session_id = session.session_id.to_string();
    let state = serde_json::to_string(&session.state)
        .map_err(|e| Error::Internal(format!("Failed to serialize state: {}", e)))?;
    let errors = serde_json::to_string(&session.errors)
        .map_err(|e| Error::Internal(format!("Failed to serialize errors: {}", e)))?;
    let started_at = session.started_at.to_rfc3339();
    let ended_at = session.ended_at.map(|dt| dt.to_rfc3339());

    sqlx::query(
        r#"
        INSERT INTO workflow_sessions (
            session_id, state,
            progress_current, progress_total, progress_percentage,
            current_operation, errors, started_at, ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            state = excluded.state,
            progress_current = excluded.progress_current,
            progress_total = excluded.progress_total,
            progress_percentage = excluded.progress_percentage,
            current_operation = excluded.current_operation,
            errors = excluded.errors,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(&session_id)
    .bind(&state)
    .bind(session.progress.current as i64)
    .bind(session.progress.total as i64)
    .bind(session.progress.percentage)
    .bind(&session.progress.current_operation)
    .bind(&errors)
    .bind(&started_at)
    .bind(&ended_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a workflow session
pub async fn load_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<WorkflowSession>> {
    let row = sqlx::query(
        r#"
        SELECT session_id, state,
               progress_current, progress_total, progress_percentage,
               current_operation, errors, started_at, ended_at
        FROM workflow_sessions
        WHERE session_id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let state: String = row.get("state");
            let state: WorkflowState = serde_json::from_str(&state)
                .map_err(|e| Error::Internal(format!("Failed to deserialize state: {}", e)))?;

            let errors: String = row.get("errors");
            let errors: Vec<SessionError> = serde_json::from_str(&errors)
                .map_err(|e| Error::Internal(format!("Failed to deserialize errors: {}", e)))?;

            let started_at: String = row.get("started_at");
            let started_at = chrono::DateTime::parse_from_rfc3339(&started_at)
                .map_err(|e| Error::Internal(format!("Failed to parse started_at: {}", e)))?
                .with_timezone(&chrono::Utc);

            let ended_at: Option<String> = row.get("ended_at");
            let ended_at = ended_at
                .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
                .transpose()
                .map_err(|e| Error::Internal(format!("Failed to parse ended_at: {}", e)))?
                .map(|dt| dt.with_timezone(&chrono::Utc));

            let progress = WorkflowProgress {
                current: row.get::<i64, _>("progress_current") as usize,
                total: row.get::<i64, _>("progress_total") as usize,
                percentage: row.get("progress_percentage"),
                current_operation: row.get("current_operation"),
            };

            Ok(Some(WorkflowSession {
                session_id,
                state,
                progress,
                errors,
                started_at,
                ended_at,
            }))
        }
        None => Ok(None),
    }
}

/// Check whether any workflow session is currently running
///
/// Exactly one workflow runs at a time by construction; a second
/// invocation while busy must be rejected by the caller.
pub async fn has_running_session(pool: &SqlitePool) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM workflow_sessions
        WHERE state NOT IN ('"COMPLETED"', '"CANCELLED"', '"FAILED"')
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Cleanup stale workflow sessions on startup
///
/// A session not in a terminal state at startup belongs to a previous
/// process and will never progress; mark it cancelled.
pub async fn cleanup_stale_sessions(pool: &SqlitePool) -> Result<usize> {
    let result = sqlx::query(
        r#"
        UPDATE workflow_sessions
        SET state = '"CANCELLED"',
            ended_at = ?,
            current_operation = 'Workflow cancelled - service was restarted'
        WHERE state NOT IN ('"COMPLETED"', '"CANCELLED"', '"FAILED"')
        "#,
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}
