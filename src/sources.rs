//! Collection source directory listing.
//!
//! The document source collaborator is a directory tree with one
//! subdirectory per collection, each containing plain-text source files.
//! The core consumes this listing contract but does not own it: all
//! regular files are read, excluding dotfiles and metadata-prefixed
//! names, sorted for deterministic ordering.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, RetrievalError};

/// Files whose name starts with this prefix are sidecar metadata, not
/// retrievable content.
const METADATA_PREFIX: &str = "metadata";

#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Collection-relative path, used as the collection-local filename.
    pub name: String,
    pub path: PathBuf,
}

pub fn collection_dir(config: &Config, collection: &str) -> PathBuf {
    config.sources.root.join(collection)
}

/// Names of all collections (one subdirectory each), sorted.
pub fn list_collections(config: &Config) -> Result<Vec<String>> {
    let root = &config.sources.root;
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// List a collection's source files, excluding hidden and metadata files.
pub fn list_files(config: &Config, collection: &str) -> Result<Vec<SourceFile>> {
    let dir = collection_dir(config, collection);
    if !dir.is_dir() {
        return Err(RetrievalError::CollectionNotFound(collection.to_string()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&dir) {
        let entry = entry.map_err(|e| {
            RetrievalError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "walk error")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(&dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if relative.components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            name.starts_with('.') || name.starts_with(METADATA_PREFIX)
        }) {
            continue;
        }

        files.push(SourceFile {
            name: rel_str,
            path: path.to_path_buf(),
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Read every source file's content. Unreadable files become empty
/// strings rather than aborting the listing.
pub fn read_files(config: &Config, collection: &str) -> Result<Vec<(String, String)>> {
    let files = list_files(config, collection)?;
    Ok(files
        .into_iter()
        .map(|f| {
            let content = std::fs::read_to_string(&f.path).unwrap_or_default();
            (f.name, content)
        })
        .collect())
}
