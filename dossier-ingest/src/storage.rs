//! Blob storage
//!
//! Two layers: a session-transient in-process cache for preview bytes
//! (`mem:` references, valid only until the process exits) and a
//! durable filesystem store the HTTP layer serves under `/files/`.
//! The persistence reconciler promotes cache entries into the store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use dossier_common::{ids, Error, Result};

/// Prefix marking a transient in-process blob reference
pub const TRANSIENT_PREFIX: &str = "mem:";

/// Public URL prefix for durable blobs
pub const FILES_URL_PREFIX: &str = "/files";

/// True when `url` points into the transient cache and will not
/// survive a restart
pub fn is_transient(url: &str) -> bool {
    url.starts_with(TRANSIENT_PREFIX)
}

/// Session-transient blob cache
#[derive(Clone, Default)]
pub struct BlobCache {
    inner: Arc<RwLock<HashMap<String, Arc<Vec<u8>>>>>,
}

impl BlobCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes, returning a `mem:` reference
    pub fn put(&self, bytes: Vec<u8>) -> String {
        let url = format!("{}{}", TRANSIENT_PREFIX, ids::local_token());
        self.inner
            .write()
            .expect("blob cache lock poisoned")
            .insert(url.clone(), Arc::new(bytes));
        url
    }

    pub fn get(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        self.inner
            .read()
            .expect("blob cache lock poisoned")
            .get(url)
            .cloned()
    }

    pub fn remove(&self, url: &str) {
        self.inner
            .write()
            .expect("blob cache lock poisoned")
            .remove(url);
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("blob cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Durable filesystem blob store
///
/// Blobs are keyed `{case_study_id}/{ai_name}` and served back under
/// [`FILES_URL_PREFIX`] by the HTTP layer.
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a blob and return its durable public URL
    pub fn put(&self, case_study_id: &str, ai_name: &str, bytes: &[u8]) -> Result<String> {
        let study_component = sanitize_component(case_study_id);
        let name_component = sanitize_component(ai_name);
        if study_component.is_empty() || name_component.is_empty() {
            return Err(Error::InvalidInput(
                "Blob path components must be non-empty".to_string(),
            ));
        }

        let dir = self.root.join(&study_component);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(&name_component), bytes)?;

        Ok(format!(
            "{}/{}/{}",
            FILES_URL_PREFIX, study_component, name_component
        ))
    }
}

/// Strip path separators and traversal sequences out of a single path
/// component. Derived names come from model output and cannot be
/// trusted as-is.
fn sanitize_component(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .replace("..", "_")
}
