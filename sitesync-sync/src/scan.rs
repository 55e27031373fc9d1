//! Local site scan: walk the site directory and fingerprint every file.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use sitesync_core::{FileRecord, Fingerprint, Inventory, ObjectKey};

use crate::error::{io_err, SyncError};

/// Local inventory plus where each key's content lives on disk.
#[derive(Debug, Default)]
pub struct LocalInventory {
    pub records: Inventory,
    pub sources: BTreeMap<ObjectKey, PathBuf>,
}

impl LocalInventory {
    pub fn source(&self, key: &ObjectKey) -> Result<&Path, SyncError> {
        self.sources
            .get(key)
            .map(PathBuf::as_path)
            .ok_or_else(|| SyncError::MissingSource(key.to_string()))
    }
}

/// Walk `site_dir` recursively and build the local inventory.
///
/// Only regular files become objects; symlinks are followed. Keys are the
/// paths relative to `site_dir`, joined with `/`.
pub fn scan_site(site_dir: &Path) -> Result<LocalInventory, SyncError> {
    let mut inventory = LocalInventory::default();
    for entry in WalkDir::new(site_dir).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(site_dir).unwrap_or(path);
        let key = key_from_relative_path(relative)?;
        let (fingerprint, size) = fingerprint_file(path)?;
        tracing::debug!("scanned {key} ({size} bytes)");

        inventory
            .records
            .insert(key.clone(), FileRecord::new(key.clone(), fingerprint, size));
        inventory.sources.insert(key, path.to_path_buf());
    }
    Ok(inventory)
}

/// Convert a relative filesystem path into an object key.
pub fn key_from_relative_path(relative: &Path) -> Result<ObjectKey, SyncError> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| SyncError::NonUtf8Path {
                    path: relative.to_path_buf(),
                })?;
                segments.push(part);
            }
            Component::CurDir => {}
            _ => {
                return Err(io_err(
                    relative,
                    std::io::Error::other("path escapes the site directory"),
                ))
            }
        }
    }
    Ok(ObjectKey::from_segments(&segments)?)
}

/// SHA-256 (hex) and byte length of a file's content.
pub fn fingerprint_file(path: &Path) -> Result<(Fingerprint, u64), SyncError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    let size = std::io::copy(&mut file, &mut hasher).map_err(|e| io_err(path, e))?;
    Ok((Fingerprint(hex::encode(hasher.finalize())), size))
}

/// SHA-256 (hex) of an in-memory buffer.
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint(hex::encode(hasher.finalize()))
}
