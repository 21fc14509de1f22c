//! Upload/synthesis workflow
//!
//! One workflow runs at a time. An upload batch moves through archive
//! expansion and strictly sequential per-unit analysis into the staging
//! collection; a synthesis request turns the staged assets into a case
//! study and hands it to the persistence reconciler. Cancellation is
//! cooperative: a shared token is checked at every loop iteration and
//! immediately after every awaited external call.
//!
//! # Error handling
//! - Per-unit isolation: an analysis or expansion failure drops that
//!   unit and the batch continues
//! - Synthesis failure leaves the staging collection untouched for retry
//! - Persistence failure after synthesis is non-fatal; the study stays
//!   visible locally tagged `sync_failed`

pub mod orchestrator;

pub use orchestrator::{UploadOrchestrator, UploadedFile};
