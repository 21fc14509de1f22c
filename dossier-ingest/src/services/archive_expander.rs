//! Archive expansion
//!
//! Zipped source bundles are expanded into individual units before
//! analysis. Only text/code/markup formats are auto-expanded; binary
//! media inside archives is intentionally excluded. Expansion failures
//! are scoped to the one archive and never abort the rest of a batch.

use std::io::{Cursor, Read};
use thiserror::Error;

/// Extensions eligible for auto-expansion out of an archive
pub const UNPACK_EXTENSIONS: &[&str] = &[
    "md", "js", "jsx", "ts", "tsx", "css", "html", "json", "txt", "py", "go", "rs", "svg", "fig",
    "sql",
];

/// Archive expansion errors, tagged with the archive file name so the
/// caller can surface a per-input message
#[derive(Debug, Error)]
pub enum ExpanderError {
    #[error("Archive extraction failed for {name}: {message}")]
    Unreadable { name: String, message: String },

    #[error("Archive entry could not be read from {name}: {message}")]
    Entry { name: String, message: String },
}

/// One file expanded out of an archive
#[derive(Debug, Clone)]
pub struct ExpandedEntry {
    pub name: String,
    pub content: Vec<u8>,
    /// Extension, doubling as the type hint for downstream analysis
    pub extension: String,
}

/// True when the file name marks a compressed upload
pub fn is_archive(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".zip")
}

/// Expand a zip archive into its allow-listed entries
///
/// Directory entries and files with extensions outside
/// [`UNPACK_EXTENSIONS`] are skipped silently.
pub fn expand_archive(archive_name: &str, bytes: &[u8]) -> Result<Vec<ExpandedEntry>, ExpanderError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExpanderError::Unreadable {
            name: archive_name.to_string(),
            message: e.to_string(),
        })?;

    let mut entries = Vec::new();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(|e| ExpanderError::Entry {
            name: archive_name.to_string(),
            message: e.to_string(),
        })?;

        if file.is_dir() {
            continue;
        }

        let entry_name = file.name().to_string();
        let Some(extension) = allowed_extension(&entry_name) else {
            continue;
        };

        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)
            .map_err(|e| ExpanderError::Entry {
                name: archive_name.to_string(),
                message: format!("{}: {}", entry_name, e),
            })?;

        entries.push(ExpandedEntry {
            name: entry_name,
            content,
            extension,
        });
    }

    tracing::debug!(
        archive = archive_name,
        entries = entries.len(),
        "Archive expanded"
    );

    Ok(entries)
}

/// Lowercased extension when it is in the allow-list
fn allowed_extension(name: &str) -> Option<String> {
    let extension = name.rsplit('.').next()?.to_ascii_lowercase();
    if name.contains('.') && UNPACK_EXTENSIONS.contains(&extension.as_str()) {
        Some(extension)
    } else {
        None
    }
}
