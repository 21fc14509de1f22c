//! Workflow orchestrator
//!
//! Owns the staging collection and drives both workflow phases:
//! archive expansion → per-unit analysis → staging, and
//! synthesis → assembly → persistence. All collaborators are passed in
//! at construction, so tests run the full workflow against stub
//! adapters and an in-memory database.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use dossier_common::events::{DossierEvent, EventBus};

use crate::cache::LocalCache;
use crate::db::sessions::save_session;
use crate::db::studies::{apply_saved, save_case_study};
use crate::models::{Asset, CaseStudy, SyncState, UserRole, WorkflowSession, WorkflowState};
use crate::services::archive_expander::{expand_archive, is_archive};
use crate::services::asset_assembler::{assemble, MAX_PREVIEW_BYTES};
use crate::services::asset_analyzer::Analyzer;
use crate::services::study_synthesizer::Synthesizer;
use crate::storage::{BlobCache, BlobStore};

/// Simulated progress starts here when synthesis begins
const SYNTHESIS_START_PERCENT: f64 = 10.0;
/// Progress jumps here once the real synthesis result arrives
const FINALIZE_PERCENT: f64 = 95.0;
/// Simulated progress tick period
const TICK_MS: u64 = 600;
/// Display-settling delay before a completed synthesis returns to idle
const SETTLE_DELAY_MS: u64 = 500;

/// One raw uploaded file
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Upload/synthesis orchestrator
pub struct UploadOrchestrator {
    db: SqlitePool,
    event_bus: EventBus,
    staging: Arc<RwLock<Vec<Asset>>>,
    blob_cache: BlobCache,
    blob_store: BlobStore,
    cache: Arc<LocalCache>,
    analyzer: Arc<dyn Analyzer>,
    synthesizer: Arc<dyn Synthesizer>,
}

impl UploadOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        staging: Arc<RwLock<Vec<Asset>>>,
        blob_cache: BlobCache,
        blob_store: BlobStore,
        cache: Arc<LocalCache>,
        analyzer: Arc<dyn Analyzer>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            db,
            event_bus,
            staging,
            blob_cache,
            blob_store,
            cache,
            analyzer,
            synthesizer,
        }
    }

    /// Analyze an upload batch into the staging collection
    ///
    /// Archives are expanded first, feeding their entries into the same
    /// per-unit loop. Units are analyzed strictly sequentially so
    /// progress updates and AI requests stay deterministic and
    /// rate-limit friendly. A cancelled batch stages nothing.
    pub async fn ingest_batch(
        &self,
        role: UserRole,
        files: Vec<UploadedFile>,
        use_enhanced: bool,
        auto_rename: bool,
        mut session: WorkflowSession,
        cancel: CancellationToken,
    ) -> anyhow::Result<WorkflowSession> {
        ensure_can_publish(role)?;

        tracing::info!(
            session_id = %session.session_id,
            files = files.len(),
            "Starting ingest workflow"
        );

        // Expansion pass: archives become individual units, other files
        // pass through as single units.
        let mut units: Vec<UploadedFile> = Vec::new();
        for file in files {
            if is_archive(&file.name) {
                match expand_archive(&file.name, &file.bytes) {
                    Ok(entries) => {
                        for entry in entries {
                            units.push(UploadedFile {
                                name: entry.name,
                                mime_type: "text/plain".to_string(),
                                bytes: entry.content,
                            });
                        }
                    }
                    Err(e) => {
                        // Scoped to this one archive; other inputs proceed.
                        tracing::warn!(file = %file.name, error = %e, "Archive expansion failed");
                        session.add_error(file.name.clone(), e.to_string());
                        self.event_bus.emit(DossierEvent::ArchiveExpansionFailed {
                            session_id: session.session_id,
                            file_name: file.name,
                            message: e.to_string(),
                            timestamp: Utc::now(),
                        });
                    }
                }
            } else {
                units.push(file);
            }
        }

        let total = units.len();
        session.update_progress(0, total, "Analyzing uploads...".to_string());
        save_session(&self.db, &session).await?;
        self.event_bus.emit(DossierEvent::IngestSessionStarted {
            session_id: session.session_id,
            total_units: total,
            timestamp: Utc::now(),
        });

        let mut batch: Vec<Asset> = Vec::new();
        // Transient references created for this batch; released if the
        // batch is discarded on cancellation.
        let mut batch_urls: Vec<String> = Vec::new();

        for (index, unit) in units.iter().enumerate() {
            if cancel.is_cancelled() {
                return self.discard_batch(session, batch_urls).await;
            }

            session.update_progress(index, total, format!("Analyzing {}", unit.name));
            save_session(&self.db, &session).await?;

            let analysis = if auto_rename {
                match self
                    .analyzer
                    .analyze(&unit.name, &unit.bytes, &unit.mime_type, use_enhanced)
                    .await
                {
                    Ok(result) => Some(result),
                    Err(e) => {
                        // Per-unit failure: drop this unit, continue the batch.
                        tracing::warn!(file = %unit.name, error = %e, "Analysis failed, unit dropped");
                        session.add_error(unit.name.clone(), e.to_string());
                        self.event_bus.emit(DossierEvent::AssetAnalysisFailed {
                            session_id: session.session_id,
                            file_name: unit.name.clone(),
                            message: e.to_string(),
                            timestamp: Utc::now(),
                        });
                        if cancel.is_cancelled() {
                            return self.discard_batch(session, batch_urls).await;
                        }
                        self.report_progress(&mut session, index + 1, total).await?;
                        continue;
                    }
                }
            } else {
                None
            };

            // Re-read the flag immediately after the await: a result
            // arriving for a cancelled batch is discarded, not staged.
            if cancel.is_cancelled() {
                return self.discard_batch(session, batch_urls).await;
            }

            let url = if (unit.bytes.len() as u64) < MAX_PREVIEW_BYTES
                && !unit.mime_type.contains("zip")
            {
                let url = self.blob_cache.put(unit.bytes.clone());
                batch_urls.push(url.clone());
                url
            } else {
                String::new()
            };

            let asset = assemble(&unit.name, unit.bytes.len() as u64, url, analysis, auto_rename);

            self.event_bus.emit(DossierEvent::AssetAnalyzed {
                session_id: session.session_id,
                asset_id: asset.id.clone(),
                ai_name: asset.ai_name.clone(),
                index,
                total,
                timestamp: Utc::now(),
            });

            batch.push(asset);
            self.report_progress(&mut session, index + 1, total).await?;
        }

        // Stage the whole batch at once; a cancelled batch never
        // contributes partial assets.
        let staged_count = batch.len();
        {
            let mut staging = self.staging.write().await;
            staging.extend(batch);
            self.cache.set_assets(staging.clone());
        }

        session.transition_to(WorkflowState::Completed);
        session.update_progress(total, total, "Analysis complete".to_string());
        save_session(&self.db, &session).await?;
        self.event_bus.emit(DossierEvent::SessionCompleted {
            session_id: session.session_id,
            timestamp: Utc::now(),
        });

        tracing::info!(
            session_id = %session.session_id,
            staged = staged_count,
            failed = session.errors.len(),
            "Ingest workflow completed"
        );

        Ok(session)
    }

    /// Synthesize a case study from the staged assets
    ///
    /// Returns the finished study alongside the terminal session; the
    /// study is `None` when the workflow was cancelled.
    pub async fn synthesize_study(
        &self,
        role: UserRole,
        context_hint: &str,
        use_enhanced: bool,
        mut session: WorkflowSession,
        cancel: CancellationToken,
    ) -> anyhow::Result<(WorkflowSession, Option<CaseStudy>)> {
        ensure_can_publish(role)?;

        let staged = self.staging.read().await.clone();
        if staged.is_empty() {
            session.transition_to(WorkflowState::Failed);
            session.progress.current_operation = "No staged assets to synthesize".to_string();
            save_session(&self.db, &session).await?;
            anyhow::bail!("No staged assets to synthesize");
        }

        tracing::info!(
            session_id = %session.session_id,
            staged = staged.len(),
            "Starting synthesis workflow"
        );

        session.set_percentage(
            SYNTHESIS_START_PERCENT,
            "Synthesizing case study...".to_string(),
        );
        save_session(&self.db, &session).await?;
        self.event_bus.emit(DossierEvent::SynthesisStarted {
            session_id: session.session_id,
            asset_count: staged.len(),
            timestamp: Utc::now(),
        });

        // The AI call reports no intermediate progress, so a cosmetic
        // ticker advances the bar while it runs. The guard aborts the
        // task whichever way this scope exits.
        let ticker = ProgressTicker::spawn(
            self.db.clone(),
            self.event_bus.clone(),
            session.session_id,
            SYNTHESIS_START_PERCENT,
        );

        let result = self
            .synthesizer
            .synthesize(&staged, context_hint, use_enhanced)
            .await;
        drop(ticker);

        if cancel.is_cancelled() {
            // The in-flight result is discarded; staging stays intact.
            session.transition_to(WorkflowState::Cancelled);
            session.progress.current_operation = "Workflow cancelled by user".to_string();
            save_session(&self.db, &session).await?;
            self.event_bus.emit(DossierEvent::SessionCancelled {
                session_id: session.session_id,
                timestamp: Utc::now(),
            });
            return Ok((session, None));
        }

        let narrative = match result {
            Ok(narrative) => narrative,
            Err(e) => {
                // Staged assets remain staged so the user can retry.
                tracing::error!(session_id = %session.session_id, error = %e, "Synthesis failed");
                session.transition_to(WorkflowState::Failed);
                session.progress.current_operation = e.to_string();
                save_session(&self.db, &session).await?;
                self.event_bus.emit(DossierEvent::SessionFailed {
                    session_id: session.session_id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e.into());
            }
        };

        session.transition_to(WorkflowState::Finalizing);
        session.set_percentage(FINALIZE_PERCENT, "Assembling case study...".to_string());
        save_session(&self.db, &session).await?;
        self.event_bus.emit(DossierEvent::SynthesisProgress {
            session_id: session.session_id,
            percentage: FINALIZE_PERCENT,
            simulated: false,
            timestamp: Utc::now(),
        });

        let mut study = CaseStudy::from_narrative(narrative, staged.clone());
        let local_id = study.id.clone();

        match save_case_study(&self.db, &self.blob_cache, &self.blob_store, &study, &staged).await {
            Ok(saved) => {
                apply_saved(&mut study, &saved);
                self.event_bus.emit(DossierEvent::StudyPersisted {
                    study_id: local_id.clone(),
                    server_id: study.id.clone(),
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                // Non-fatal: the study stays visible locally and the
                // next successful save retries the insert.
                tracing::warn!(study_id = %local_id, error = %e, "Draft auto-save failed");
                study.sync_state = SyncState::SyncFailed;
                self.event_bus.emit(DossierEvent::PersistenceWarning {
                    study_id: local_id.clone(),
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }

        session.set_percentage(100.0, "Case study ready".to_string());
        save_session(&self.db, &session).await?;

        {
            let mut staging = self.staging.write().await;
            staging.clear();
        }
        self.cache.set_assets(Vec::new());
        self.cache.upsert_study(&study);

        self.event_bus.emit(DossierEvent::StudyCreated {
            session_id: session.session_id,
            study_id: study.id.clone(),
            title: study.title.clone(),
            timestamp: Utc::now(),
        });

        // Short display-settling delay before returning to idle.
        tokio::time::sleep(Duration::from_millis(SETTLE_DELAY_MS)).await;

        session.transition_to(WorkflowState::Completed);
        save_session(&self.db, &session).await?;
        self.event_bus.emit(DossierEvent::SessionCompleted {
            session_id: session.session_id,
            timestamp: Utc::now(),
        });

        Ok((session, Some(study)))
    }

    async fn discard_batch(
        &self,
        mut session: WorkflowSession,
        urls: Vec<String>,
    ) -> anyhow::Result<WorkflowSession> {
        for url in urls {
            self.blob_cache.remove(&url);
        }
        session.transition_to(WorkflowState::Cancelled);
        session.progress.current_operation = "Workflow cancelled by user".to_string();
        save_session(&self.db, &session).await?;
        self.event_bus.emit(DossierEvent::SessionCancelled {
            session_id: session.session_id,
            timestamp: Utc::now(),
        });
        tracing::info!(session_id = %session.session_id, "Ingest cancelled, batch discarded");
        Ok(session)
    }

    async fn report_progress(
        &self,
        session: &mut WorkflowSession,
        current: usize,
        total: usize,
    ) -> anyhow::Result<()> {
        let operation = format!("Analyzed {}/{}", current, total);
        session.update_progress(current, total, operation.clone());
        save_session(&self.db, session).await?;
        self.event_bus.emit(DossierEvent::IngestProgress {
            session_id: session.session_id,
            current,
            total,
            percentage: session.progress.percentage,
            operation,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

/// Role gate at the workflow entry point. The HTTP layer rejects
/// unauthorized callers too; this check stands on its own so the
/// orchestrator cannot be driven past the UI gating.
fn ensure_can_publish(role: UserRole) -> anyhow::Result<()> {
    if role.can_publish() {
        Ok(())
    } else {
        anyhow::bail!("Role {:?} may not create content", role)
    }
}

/// Cosmetic synthesis progress: shrinking increments toward an upper
/// bound the timer never crosses on its own
pub(crate) fn next_simulated_percentage(current: f64) -> f64 {
    if current < 60.0 {
        current + 4.0
    } else if current < 80.0 {
        current + 2.0
    } else if current < 90.0 {
        current + 0.5
    } else {
        current
    }
}

/// Spawned task advancing simulated progress; aborted on drop so no
/// timer outlives its synthesis phase
struct ProgressTicker {
    handle: tokio::task::JoinHandle<()>,
}

impl ProgressTicker {
    fn spawn(db: SqlitePool, event_bus: EventBus, session_id: Uuid, start: f64) -> Self {
        let handle = tokio::spawn(async move {
            let mut percentage = start;
            let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
            interval.tick().await; // first tick completes immediately

            loop {
                interval.tick().await;
                percentage = next_simulated_percentage(percentage);

                let _ = sqlx::query(
                    "UPDATE workflow_sessions SET progress_percentage = ? WHERE session_id = ?",
                )
                .bind(percentage)
                .bind(session_id.to_string())
                .execute(&db)
                .await;

                event_bus.emit(DossierEvent::SynthesisProgress {
                    session_id,
                    percentage,
                    simulated: true,
                    timestamp: Utc::now(),
                });
            }
        });

        Self { handle }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_progress_never_reaches_completion() {
        let mut percentage = SYNTHESIS_START_PERCENT;
        for _ in 0..1000 {
            let next = next_simulated_percentage(percentage);
            assert!(next >= percentage);
            percentage = next;
        }
        assert!(percentage < 100.0);
        assert!(percentage >= 90.0);
    }

    #[test]
    fn simulated_progress_slows_down_near_the_top() {
        assert_eq!(next_simulated_percentage(10.0), 14.0);
        assert_eq!(next_simulated_percentage(70.0), 72.0);
        assert_eq!(next_simulated_percentage(85.0), 85.5);
        assert_eq!(next_simulated_percentage(92.0), 92.0);
    }

    #[test]
    fn reader_role_is_rejected() {
        assert!(ensure_can_publish(UserRole::Reader).is_err());
        assert!(ensure_can_publish(UserRole::Publisher).is_ok());
        assert!(ensure_can_publish(UserRole::SuperAdmin).is_ok());
    }
}
