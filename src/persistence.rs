//! Persistence layer for vector index snapshots.
//!
//! Supports both JSON (human-readable) and bincode (efficient binary) formats.
//! Snapshots are trusted on load: nothing checks them against the corpus.

use crate::error::{RagError, Result};
use crate::index::EmbeddingIndex;
use std::fs;
use std::path::Path;

/// Save format for index snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json,
        }
    }
}

/// Save an index snapshot, creating parent directories as needed.
pub fn save_index(index: &EmbeddingIndex, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| RagError::io(parent, e))?;
        }
    }

    let data = match SaveFormat::from_path(path) {
        SaveFormat::Json => serde_json::to_vec(index)?,
        SaveFormat::Bincode => bincode::encode_to_vec(index, bincode::config::standard())
            .map_err(|e| RagError::Serialization(e.to_string()))?,
    };

    fs::write(path, &data).map_err(|e| RagError::io(path, e))?;

    Ok(())
}

/// Load an index snapshot.
pub fn load_index(path: &Path) -> Result<EmbeddingIndex> {
    if !index_exists(path) {
        return Err(RagError::IndexNotFound(path.to_path_buf()));
    }

    let data = fs::read(path).map_err(|e| RagError::io(path, e))?;

    let index = match SaveFormat::from_path(path) {
        SaveFormat::Json => serde_json::from_slice(&data)?,
        SaveFormat::Bincode => {
            let (index, _): (EmbeddingIndex, usize) =
                bincode::decode_from_slice(&data, bincode::config::standard())
                    .map_err(|e| RagError::Serialization(e.to_string()))?;
            index
        }
    };

    Ok(index)
}

/// Check if a snapshot exists at the given path.
pub fn index_exists(path: &Path) -> bool {
    path.is_file()
}

/// Get the size of a snapshot in bytes.
pub fn index_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| RagError::io(path, e))?;
    Ok(metadata.len())
}
