//! dossier-ingest - Artifact Ingest Service
//!
//! Ingests uploaded design/dev artifacts, derives semantic metadata for
//! each through an AI model, synthesizes case-study narratives from the
//! staged batch, and reconciles the results against the record store.
//! The presentation layer talks to it over HTTP REST + SSE.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use dossier_common::config::{DataFolderInitializer, DataFolderResolver};
use dossier_common::events::EventBus;

use dossier_ingest::cache::LocalCache;
use dossier_ingest::storage::BlobStore;
use dossier_ingest::AppState;

const LISTEN_ADDR: &str = "127.0.0.1:5742";

#[tokio::main]
async fn main() -> Result<()> {
    // Load TOML config first; it may carry the log level
    let config_path = std::env::var("DOSSIER_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| dossier_common::config::default_config_path("dossier-ingest"));
    let toml_config = dossier_common::config::load_toml_config(&config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    let level = toml_config
        .logging
        .level
        .as_deref()
        .and_then(|l| l.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting dossier-ingest (Artifact Ingest) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve and prepare the data folder
    let resolver = DataFolderResolver::new("dossier-ingest");
    let data_folder = resolver.resolve(&toml_config);
    let initializer = DataFolderInitializer::new(data_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize data folder: {}", e))?;
    info!("Data folder: {}", initializer.root().display());

    // Open or create the database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = dossier_ingest::db::init_database_pool(&db_path).await?;

    // Sessions from a previous run will never progress; close them out
    let stale = dossier_ingest::db::sessions::cleanup_stale_sessions(&db_pool).await?;
    if stale > 0 {
        info!("Cleaned up {} stale workflow session(s)", stale);
    }

    // Durable blob storage and the local snapshot cache
    let blob_store = BlobStore::new(initializer.blob_root())
        .map_err(|e| anyhow::anyhow!("Failed to initialize blob store: {}", e))?;
    let cache = std::sync::Arc::new(LocalCache::load(initializer.cache_path()));

    // Event bus for SSE broadcasting
    let event_bus = EventBus::new(100);

    let state = AppState::new(db_pool, event_bus, blob_store, cache, toml_config);
    let app = dossier_ingest::build_router(state);

    let listener = tokio::net::TcpListener::bind(LISTEN_ADDR).await?;
    info!("Listening on http://{}", LISTEN_ADDR);
    info!("Health check: http://{}/health", LISTEN_ADDR);

    axum::serve(listener, app).await?;

    Ok(())
}
