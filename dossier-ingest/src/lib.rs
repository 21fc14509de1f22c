//! dossier-ingest library interface
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use dossier_common::config::TomlConfig;
use dossier_common::events::EventBus;

use crate::cache::LocalCache;
use crate::models::Asset;
use crate::storage::{BlobCache, BlobStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Staged assets awaiting synthesis, reviewable by the user
    pub staging: Arc<RwLock<Vec<Asset>>>,
    /// Session-transient preview bytes
    pub blob_cache: BlobCache,
    /// Durable blob storage
    pub blob_store: BlobStore,
    /// Local snapshot cache (startup seed + write-through)
    pub cache: Arc<LocalCache>,
    /// Cancellation tokens for active workflow sessions
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// TOML configuration loaded at startup
    pub toml_config: Arc<TomlConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        blob_store: BlobStore,
        cache: Arc<LocalCache>,
        toml_config: TomlConfig,
    ) -> Self {
        Self {
            db,
            event_bus,
            staging: Arc::new(RwLock::new(Vec::new())),
            blob_cache: BlobCache::new(),
            blob_store,
            cache,
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            toml_config: Arc::new(toml_config),
            startup_time: Utc::now(),
        }
    }

    /// Current staging collection (user-reviewable)
    pub async fn staged_assets(&self) -> Vec<Asset> {
        self.staging.read().await.clone()
    }

    /// Remove one staged asset; returns false when the id is unknown.
    /// Removal is independent of any already-synthesized study that
    /// copied the asset.
    pub async fn remove_staged(&self, asset_id: &str) -> bool {
        let mut staging = self.staging.write().await;
        let before = staging.len();
        if let Some(asset) = staging.iter().find(|a| a.id == asset_id) {
            if storage::is_transient(&asset.url) {
                self.blob_cache.remove(&asset.url);
            }
        }
        staging.retain(|a| a.id != asset_id);
        let removed = staging.len() < before;
        if removed {
            self.cache.set_assets(staging.clone());
        }
        removed
    }

    /// Clear the whole staging collection
    pub async fn clear_staged(&self) {
        let mut staging = self.staging.write().await;
        for asset in staging.iter() {
            if storage::is_transient(&asset.url) {
                self.blob_cache.remove(&asset.url);
            }
        }
        staging.clear();
        self.cache.set_assets(Vec::new());
    }

    /// Orchestrator wired to this state's collaborators, with the given
    /// AI adapters
    pub fn orchestrator(
        &self,
        analyzer: Arc<dyn services::asset_analyzer::Analyzer>,
        synthesizer: Arc<dyn services::study_synthesizer::Synthesizer>,
    ) -> workflow::UploadOrchestrator {
        workflow::UploadOrchestrator::new(
            self.db.clone(),
            self.event_bus.clone(),
            self.staging.clone(),
            self.blob_cache.clone(),
            self.blob_store.clone(),
            self.cache.clone(),
            analyzer,
            synthesizer,
        )
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;
    use tower_http::services::ServeDir;

    let files_dir = state.blob_store.root().to_path_buf();

    Router::new()
        .merge(api::ingest_routes())
        .merge(api::study_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .route("/ingest/events", get(api::ingest_event_stream))
        .nest_service("/files", ServeDir::new(files_dir))
        .with_state(state)
}
