//! # Dossier Common Library
//!
//! Shared code for the Dossier services including:
//! - Error types
//! - Event types and the broadcast event bus
//! - Configuration loading and data-folder resolution
//! - Identifier utilities (local tokens vs server UUIDs)

pub mod config;
pub mod error;
pub mod events;
pub mod ids;

pub use error::{Error, Result};
