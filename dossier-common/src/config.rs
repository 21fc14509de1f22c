//! Configuration loading for Dossier services
//!
//! TOML configuration plus data-folder resolution. Resolution priority
//! for the data folder is ENV → TOML → platform default; the AI API key
//! has its own three-tier resolution in the consuming service (database
//! is authoritative there and is not visible from this crate).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the data folder location
pub const DATA_DIR_ENV: &str = "DOSSIER_DATA_DIR";

/// Logging section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogConfig {
    /// Maximum log level (`error`, `warn`, `info`, `debug`, `trace`)
    pub level: Option<String>,
}

/// Per-service TOML configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TomlConfig {
    /// Data folder override (database, blob storage, local cache)
    pub data_folder: Option<String>,
    /// Gemini API key (lowest-priority source; database wins)
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub logging: LogConfig,
}

/// Default TOML config path for a service, e.g.
/// `~/.config/dossier/dossier-ingest.toml`
pub fn default_config_path(service: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dossier")
        .join(format!("{service}.toml"))
}

/// Load TOML config, returning defaults when the file does not exist
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Resolves the data folder for a service
///
/// Priority: `DOSSIER_DATA_DIR` env var → TOML `data_folder` →
/// `<platform data dir>/dossier/<service>`.
pub struct DataFolderResolver {
    service: String,
}

impl DataFolderResolver {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    pub fn resolve(&self, config: &TomlConfig) -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                return PathBuf::from(dir);
            }
        }
        if let Some(dir) = &config.data_folder {
            return PathBuf::from(dir);
        }
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dossier")
            .join(&self.service)
    }
}

/// Prepares a resolved data folder for use
pub struct DataFolderInitializer {
    root: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the data folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// SQLite database file inside the data folder
    pub fn database_path(&self) -> PathBuf {
        self.root.join("dossier.db")
    }

    /// Durable blob storage directory
    pub fn blob_root(&self) -> PathBuf {
        self.root.join("assets")
    }

    /// Local snapshot cache file
    pub fn cache_path(&self) -> PathBuf {
        self.root.join("cache.json")
    }
}
