//! Workflow orchestrator integration tests
//!
//! The orchestrator runs against stub AI adapters, an in-memory SQLite
//! database, and a temp-dir blob store, exercising staging order,
//! per-unit failure isolation, archive expansion, cancellation, and the
//! synthesis flow end to end.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use dossier_common::events::EventBus;
use dossier_common::ids::is_canonical_uuid;

use dossier_ingest::cache::LocalCache;
use dossier_ingest::models::{
    AnalysisResult, Asset, NarrativeResult, SyncState, UserRole, WorkflowSession, WorkflowState,
};
use dossier_ingest::services::asset_analyzer::{AnalysisError, Analyzer};
use dossier_ingest::services::study_synthesizer::{SynthesisError, Synthesizer};
use dossier_ingest::storage::{BlobCache, BlobStore};
use dossier_ingest::workflow::{UploadOrchestrator, UploadedFile};

// ---------------------------------------------------------------------------
// Stub adapters
// ---------------------------------------------------------------------------

/// Analyzer stub: fails for listed file names, optionally cancels a
/// token after the Nth call (to simulate a user cancelling mid-batch)
#[derive(Default)]
struct StubAnalyzer {
    fail_on: Vec<String>,
    calls: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn analyze(
        &self,
        file_name: &str,
        _bytes: &[u8],
        _mime_type: &str,
        _use_enhanced: bool,
    ) -> Result<AnalysisResult, AnalysisError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, token)) = &self.cancel_after {
            if call == *after {
                token.cancel();
            }
        }
        if self.fail_on.iter().any(|n| n == file_name) {
            return Err(AnalysisError {
                file_name: file_name.to_string(),
                message: "stub analysis failure".to_string(),
            });
        }
        Ok(AnalysisResult {
            topic: Some("stub".to_string()),
            kind: Some("doc".to_string()),
            context: Some("test".to_string()),
            variant: Some("v1".to_string()),
            version: Some("1.0".to_string()),
        })
    }
}

/// Synthesizer stub: records how many assets it was handed, optionally
/// fails or cancels a token before returning
#[derive(Default)]
struct StubSynthesizer {
    fail: bool,
    seen_assets: AtomicUsize,
    cancel: Option<CancellationToken>,
}

#[async_trait]
impl Synthesizer for StubSynthesizer {
    async fn synthesize(
        &self,
        assets: &[Asset],
        _context_hint: &str,
        _use_enhanced: bool,
    ) -> Result<NarrativeResult, SynthesisError> {
        self.seen_assets.store(assets.len(), Ordering::SeqCst);
        if let Some(token) = &self.cancel {
            token.cancel();
        }
        if self.fail {
            return Err(SynthesisError {
                message: "stub synthesis failure".to_string(),
            });
        }
        Ok(NarrativeResult {
            title: Some("Stub Study".to_string()),
            problem: Some("Stub problem".to_string()),
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    orchestrator: UploadOrchestrator,
    staging: Arc<RwLock<Vec<Asset>>>,
    db: SqlitePool,
    _tmp: tempfile::TempDir,
}

async fn harness(analyzer: Arc<dyn Analyzer>, synthesizer: Arc<dyn Synthesizer>) -> Harness {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    dossier_ingest::db::init_tables(&db).await.unwrap();

    let tmp = tempfile::TempDir::new().unwrap();
    let blob_store = BlobStore::new(tmp.path().join("assets")).unwrap();
    let cache = Arc::new(LocalCache::load(tmp.path().join("cache.json")));
    let staging = Arc::new(RwLock::new(Vec::new()));

    let orchestrator = UploadOrchestrator::new(
        db.clone(),
        EventBus::new(100),
        staging.clone(),
        BlobCache::new(),
        blob_store,
        cache,
        analyzer,
        synthesizer,
    );

    Harness {
        orchestrator,
        staging,
        db,
        _tmp: tmp,
    }
}

fn file(name: &str, bytes: &[u8]) -> UploadedFile {
    UploadedFile {
        name: name.to_string(),
        mime_type: "application/octet-stream".to_string(),
        bytes: bytes.to_vec(),
    }
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::<()>::default();
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

// ---------------------------------------------------------------------------
// Ingest tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_batch_stages_assets_in_input_order() {
    let h = harness(
        Arc::new(StubAnalyzer::default()),
        Arc::new(StubSynthesizer::default()),
    )
    .await;

    let files = vec![
        file("one.md", b"a"),
        file("two.md", b"b"),
        file("three.md", b"c"),
    ];
    let session = h
        .orchestrator
        .ingest_batch(
            UserRole::Publisher,
            files,
            false,
            true,
            WorkflowSession::new(WorkflowState::Analyzing),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(session.state, WorkflowState::Completed);
    assert_eq!(session.progress.percentage, 100.0);
    assert!(session.errors.is_empty());

    let staged = h.staging.read().await.clone();
    assert_eq!(staged.len(), 3);
    let names: Vec<&str> = staged.iter().map(|a| a.original_name.as_str()).collect();
    assert_eq!(names, vec!["one.md", "two.md", "three.md"]);
    // Analysis populated the semantic fields.
    assert_eq!(staged[0].topic, "stub");
    assert_eq!(staged[0].ai_name, "stub-doc-test-v1-1.0-md");
}

#[tokio::test]
async fn failed_unit_is_dropped_and_batch_continues() {
    let analyzer = StubAnalyzer {
        fail_on: vec!["two.md".to_string()],
        ..Default::default()
    };
    let h = harness(Arc::new(analyzer), Arc::new(StubSynthesizer::default())).await;

    let files = vec![
        file("one.md", b"a"),
        file("two.md", b"b"),
        file("three.md", b"c"),
    ];
    let session = h
        .orchestrator
        .ingest_batch(
            UserRole::Publisher,
            files,
            false,
            true,
            WorkflowSession::new(WorkflowState::Analyzing),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(session.state, WorkflowState::Completed);
    assert_eq!(session.errors.len(), 1);
    assert_eq!(session.errors[0].file_name, "two.md");

    let staged = h.staging.read().await.clone();
    let names: Vec<&str> = staged.iter().map(|a| a.original_name.as_str()).collect();
    assert_eq!(names, vec!["one.md", "three.md"]);
}

#[tokio::test]
async fn cancellation_discards_the_whole_batch() {
    let cancel = CancellationToken::new();
    let analyzer = StubAnalyzer {
        cancel_after: Some((2, cancel.clone())),
        ..Default::default()
    };
    let h = harness(Arc::new(analyzer), Arc::new(StubSynthesizer::default())).await;

    // An asset staged by an earlier batch must survive the cancellation.
    let earlier = dossier_ingest::services::assemble("earlier.md", 1, String::new(), None, true);
    h.staging.write().await.push(earlier.clone());

    let files = vec![
        file("one.md", b"a"),
        file("two.md", b"b"),
        file("three.md", b"c"),
    ];
    let session = h
        .orchestrator
        .ingest_batch(
            UserRole::Publisher,
            files,
            false,
            true,
            WorkflowSession::new(WorkflowState::Analyzing),
            cancel,
        )
        .await
        .unwrap();

    assert_eq!(session.state, WorkflowState::Cancelled);

    let staged = h.staging.read().await.clone();
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].id, earlier.id);
}

#[tokio::test]
async fn archives_are_expanded_before_analysis() {
    let h = harness(
        Arc::new(StubAnalyzer::default()),
        Arc::new(StubSynthesizer::default()),
    )
    .await;

    let archive = zip_bytes(&[
        ("readme.md", b"# readme".as_slice()),
        ("image.bin", b"\x00\x01".as_slice()),
    ]);
    let files = vec![file("logo.png", b"png"), file("notes.zip", &archive)];

    let session = h
        .orchestrator
        .ingest_batch(
            UserRole::Publisher,
            files,
            false,
            true,
            WorkflowSession::new(WorkflowState::Analyzing),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(session.state, WorkflowState::Completed);
    assert_eq!(session.progress.total, 2);

    let staged = h.staging.read().await.clone();
    let names: Vec<&str> = staged.iter().map(|a| a.original_name.as_str()).collect();
    // image.bin is not in the allow-list and never becomes a unit.
    assert_eq!(names, vec!["logo.png", "readme.md"]);
}

#[tokio::test]
async fn corrupt_archive_is_scoped_to_that_input() {
    let h = harness(
        Arc::new(StubAnalyzer::default()),
        Arc::new(StubSynthesizer::default()),
    )
    .await;

    let files = vec![file("bad.zip", b"definitely not a zip"), file("note.md", b"x")];
    let session = h
        .orchestrator
        .ingest_batch(
            UserRole::Publisher,
            files,
            false,
            true,
            WorkflowSession::new(WorkflowState::Analyzing),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(session.state, WorkflowState::Completed);
    assert_eq!(session.errors.len(), 1);
    assert_eq!(session.errors[0].file_name, "bad.zip");

    let staged = h.staging.read().await.clone();
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].original_name, "note.md");
}

#[tokio::test]
async fn auto_rename_off_skips_analysis_entirely() {
    let analyzer = Arc::new(StubAnalyzer::default());
    let h = harness(analyzer.clone(), Arc::new(StubSynthesizer::default())).await;

    let files = vec![file("plain.md", b"a")];
    h.orchestrator
        .ingest_batch(
            UserRole::Publisher,
            files,
            false,
            false,
            WorkflowSession::new(WorkflowState::Analyzing),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    let staged = h.staging.read().await.clone();
    assert_eq!(staged[0].ai_name, "plain.md");
    assert_eq!(staged[0].topic, "misc");
}

#[tokio::test]
async fn reader_role_cannot_start_a_batch() {
    let h = harness(
        Arc::new(StubAnalyzer::default()),
        Arc::new(StubSynthesizer::default()),
    )
    .await;

    let result = h
        .orchestrator
        .ingest_batch(
            UserRole::Reader,
            vec![file("one.md", b"a")],
            false,
            true,
            WorkflowSession::new(WorkflowState::Analyzing),
            CancellationToken::new(),
        )
        .await;

    assert!(result.is_err());
    assert!(h.staging.read().await.is_empty());
}

// ---------------------------------------------------------------------------
// Synthesis tests
// ---------------------------------------------------------------------------

async fn stage_batch(h: &Harness, names: &[&str]) {
    let files: Vec<UploadedFile> = names.iter().map(|n| file(n, b"content")).collect();
    h.orchestrator
        .ingest_batch(
            UserRole::Publisher,
            files,
            false,
            true,
            WorkflowSession::new(WorkflowState::Analyzing),
            CancellationToken::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn synthesis_creates_a_study_and_clears_staging() {
    let synthesizer = Arc::new(StubSynthesizer::default());
    let h = harness(Arc::new(StubAnalyzer::default()), synthesizer.clone()).await;

    stage_batch(&h, &["a.md", "b.md", "c.md", "d.md"]).await;

    let (session, study) = h
        .orchestrator
        .synthesize_study(
            UserRole::Publisher,
            "recent progress",
            false,
            WorkflowSession::new(WorkflowState::Generating),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(session.state, WorkflowState::Completed);
    let study = study.expect("study should be created");

    // All four staged assets ride along as artifacts, even though the
    // synthesizer only summarizes the most recent ones internally.
    assert_eq!(study.artifacts.len(), 4);
    assert_eq!(synthesizer.seen_assets.load(Ordering::SeqCst), 4);

    assert_eq!(study.title, "Stub Study");
    assert_eq!(study.sync_state, SyncState::Synced);
    assert!(is_canonical_uuid(&study.id));

    assert!(h.staging.read().await.is_empty());

    // The study is persisted and readable back.
    let listed = dossier_ingest::db::studies::list_case_studies(&h.db)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].artifacts.len(), 4);
}

#[tokio::test]
async fn synthesis_failure_keeps_assets_staged() {
    let synthesizer = Arc::new(StubSynthesizer {
        fail: true,
        ..Default::default()
    });
    let h = harness(Arc::new(StubAnalyzer::default()), synthesizer).await;

    stage_batch(&h, &["a.md", "b.md"]).await;

    let result = h
        .orchestrator
        .synthesize_study(
            UserRole::Publisher,
            "recent progress",
            false,
            WorkflowSession::new(WorkflowState::Generating),
            CancellationToken::new(),
        )
        .await;

    assert!(result.is_err());
    // Staged assets stay put so the user can retry.
    assert_eq!(h.staging.read().await.len(), 2);
    // No study was persisted.
    let listed = dossier_ingest::db::studies::list_case_studies(&h.db)
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn cancelled_synthesis_creates_nothing() {
    let cancel = CancellationToken::new();
    let synthesizer = Arc::new(StubSynthesizer {
        cancel: Some(cancel.clone()),
        ..Default::default()
    });
    let h = harness(Arc::new(StubAnalyzer::default()), synthesizer).await;

    stage_batch(&h, &["a.md"]).await;

    let (session, study) = h
        .orchestrator
        .synthesize_study(
            UserRole::Publisher,
            "recent progress",
            false,
            WorkflowSession::new(WorkflowState::Generating),
            cancel,
        )
        .await
        .unwrap();

    assert_eq!(session.state, WorkflowState::Cancelled);
    assert!(study.is_none());
    assert_eq!(h.staging.read().await.len(), 1);

    let listed = dossier_ingest::db::studies::list_case_studies(&h.db)
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn synthesis_requires_staged_assets() {
    let h = harness(
        Arc::new(StubAnalyzer::default()),
        Arc::new(StubSynthesizer::default()),
    )
    .await;

    let result = h
        .orchestrator
        .synthesize_study(
            UserRole::Publisher,
            "recent progress",
            false,
            WorkflowSession::new(WorkflowState::Generating),
            CancellationToken::new(),
        )
        .await;

    assert!(result.is_err());
}
