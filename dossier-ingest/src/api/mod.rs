//! HTTP API for dossier-ingest

pub mod health;
pub mod ingest;
pub mod settings;
pub mod sse;
pub mod studies;

pub use health::health_routes;
pub use ingest::ingest_routes;
pub use settings::settings_routes;
pub use sse::ingest_event_stream;
pub use studies::study_routes;
