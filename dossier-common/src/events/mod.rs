//! Event types for the Dossier event system
//!
//! Workflow progress and persistence outcomes are broadcast as
//! [`DossierEvent`]s; the HTTP layer forwards them to SSE subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Dossier event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DossierEvent {
    /// An ingest session started analyzing a batch of files
    IngestSessionStarted {
        session_id: Uuid,
        total_units: usize,
        timestamp: DateTime<Utc>,
    },

    /// A single unit finished analysis and was assembled into an asset
    AssetAnalyzed {
        session_id: Uuid,
        asset_id: String,
        ai_name: String,
        index: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Analysis failed for one unit; the batch continues
    AssetAnalysisFailed {
        session_id: Uuid,
        file_name: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Archive expansion failed for one input; other inputs continue
    ArchiveExpansionFailed {
        session_id: Uuid,
        file_name: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Determinate progress update during analysis
    IngestProgress {
        session_id: Uuid,
        current: usize,
        total: usize,
        percentage: f64,
        operation: String,
        timestamp: DateTime<Utc>,
    },

    /// Case-study synthesis started
    SynthesisStarted {
        session_id: Uuid,
        asset_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Progress update during synthesis; `simulated` marks the cosmetic
    /// estimate emitted while the AI call is in flight
    SynthesisProgress {
        session_id: Uuid,
        percentage: f64,
        simulated: bool,
        timestamp: DateTime<Utc>,
    },

    /// A case study was assembled and is visible locally
    StudyCreated {
        session_id: Uuid,
        study_id: String,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// A case study was persisted and re-keyed by the store
    StudyPersisted {
        study_id: String,
        server_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Persistence failed after synthesis; the study remains local
    PersistenceWarning {
        study_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Session finished successfully
    SessionCompleted {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Session cancelled by the user; nothing from it was staged
    SessionCancelled {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Session failed with a terminal error
    SessionFailed {
        session_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl DossierEvent {
    /// Event type name for SSE event framing
    pub fn event_type(&self) -> &'static str {
        match self {
            DossierEvent::IngestSessionStarted { .. } => "IngestSessionStarted",
            DossierEvent::AssetAnalyzed { .. } => "AssetAnalyzed",
            DossierEvent::AssetAnalysisFailed { .. } => "AssetAnalysisFailed",
            DossierEvent::ArchiveExpansionFailed { .. } => "ArchiveExpansionFailed",
            DossierEvent::IngestProgress { .. } => "IngestProgress",
            DossierEvent::SynthesisStarted { .. } => "SynthesisStarted",
            DossierEvent::SynthesisProgress { .. } => "SynthesisProgress",
            DossierEvent::StudyCreated { .. } => "StudyCreated",
            DossierEvent::StudyPersisted { .. } => "StudyPersisted",
            DossierEvent::PersistenceWarning { .. } => "PersistenceWarning",
            DossierEvent::SessionCompleted { .. } => "SessionCompleted",
            DossierEvent::SessionCancelled { .. } => "SessionCancelled",
            DossierEvent::SessionFailed { .. } => "SessionFailed",
        }
    }
}

/// Broadcast event bus shared across the service
///
/// Uses `tokio::broadcast` internally: non-blocking publish, multiple
/// concurrent subscribers, automatic cleanup when subscribers drop.
/// Events emitted with no subscribers are discarded, which is normal
/// when no SSE client is connected.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DossierEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus with the given channel capacity (events buffered
    /// before slow subscribers start lagging)
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<DossierEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers, returning the subscriber count
    pub fn emit(&self, event: DossierEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
