//! Domain models for dossier-ingest

pub mod asset;
pub mod case_study;
pub mod preferences;
pub mod session;
pub mod user;

pub use asset::{AnalysisResult, Asset, PreviewKind};
pub use case_study::{CaseStudy, NarrativeResult, SeoMetadata, StudyStatus, SyncState};
pub use preferences::{ExportFormat, Theme, UserPreferences};
pub use session::{SessionError, WorkflowProgress, WorkflowSession, WorkflowState};
pub use user::UserRole;
