//! Workflow session state machine
//!
//! A session covers one workflow run: either an upload batch
//! (ANALYZING) or a synthesis request (GENERATING → FINALIZING).
//! Exactly one session is active at a time; "idle" is the absence of a
//! non-terminal session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowState {
    /// Per-unit analysis of an upload batch
    Analyzing,
    /// Case-study synthesis in flight
    Generating,
    /// Study assembled; persistence and display settling
    Finalizing,
    /// Workflow finished successfully
    Completed,
    /// Workflow cancelled by the user
    Cancelled,
    /// Workflow failed with a terminal error
    Failed,
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_state: WorkflowState,
    pub new_state: WorkflowState,
    pub transitioned_at: DateTime<Utc>,
}

/// Progress tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowProgress {
    /// Units completed so far
    pub current: usize,
    /// Total units in the batch (0 during synthesis, which has no
    /// real unit count)
    pub total: usize,
    /// Percentage complete (0.0 - 100.0)
    pub percentage: f64,
    /// Current operation description
    pub current_operation: String,
}

/// Per-file error accumulated on a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionError {
    pub file_name: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// One workflow run (in-memory state, persisted on every update)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSession {
    pub session_id: Uuid,
    pub state: WorkflowState,
    pub progress: WorkflowProgress,
    /// Recoverable per-file errors; the batch continued past these
    pub errors: Vec<SessionError>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl WorkflowSession {
    pub fn new(initial_state: WorkflowState) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            state: initial_state,
            progress: WorkflowProgress::default(),
            errors: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new state, stamping `ended_at` for terminal ones
    pub fn transition_to(&mut self, new_state: WorkflowState) -> StateTransition {
        let transition = StateTransition {
            session_id: self.session_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if matches!(
            new_state,
            WorkflowState::Completed | WorkflowState::Cancelled | WorkflowState::Failed
        ) {
            self.ended_at = Some(Utc::now());
        }

        transition
    }

    /// Update determinate progress from completed-unit counts
    pub fn update_progress(&mut self, current: usize, total: usize, operation: String) {
        self.progress.current = current;
        self.progress.total = total;
        self.progress.percentage = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        self.progress.current_operation = operation;
    }

    /// Set the percentage directly (simulated progress during
    /// synthesis, where no real unit counts exist)
    pub fn set_percentage(&mut self, percentage: f64, operation: String) {
        self.progress.percentage = percentage.clamp(0.0, 100.0);
        self.progress.current_operation = operation;
    }

    pub fn add_error(&mut self, file_name: String, message: String) {
        self.errors.push(SessionError {
            file_name,
            message,
            occurred_at: Utc::now(),
        });
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            WorkflowState::Completed | WorkflowState::Cancelled | WorkflowState::Failed
        )
    }
}

impl Default for WorkflowProgress {
    fn default() -> Self {
        Self {
            current: 0,
            total: 0,
            percentage: 0.0,
            current_operation: String::from("Initializing..."),
        }
    }
}
