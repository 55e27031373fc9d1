//! Bucket manifest — the metadata index of a directory-backed bucket.
//!
//! Persists a [`Manifest`] JSON document at `<bucket_dir>/manifest.json`.
//! Listing the bucket means reading this file; it records, per key, the
//! content fingerprint plus the headers the object was stored with.
//! Writes use an atomic `.tmp` + rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sitesync_core::{FileRecord, Fingerprint, Inventory, ObjectKey};

use crate::error::{io_err, SyncError};

pub const MANIFEST_FILE: &str = "manifest.json";

/// `Content-Encoding` value for compressed objects.
pub const GZIP: &str = "gzip";

/// Headers stored alongside an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// `gzip` when the stored bytes are compressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
}

/// Manifest entry for a single object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub fingerprint: Fingerprint,
    pub size: u64,
    #[serde(flatten)]
    pub metadata: ObjectMetadata,
}

/// On-disk manifest payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub synced_at: DateTime<Utc>,
    #[serde(default)]
    pub objects: BTreeMap<ObjectKey, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            synced_at: Utc::now(),
            objects: BTreeMap::new(),
        }
    }
}

impl Manifest {
    /// The bucket's contents as an inventory for diffing.
    pub fn inventory(&self) -> Inventory {
        self.objects
            .iter()
            .map(|(key, entry)| {
                (
                    key.clone(),
                    FileRecord::new(key.clone(), entry.fingerprint.clone(), entry.size),
                )
            })
            .collect()
    }
}

/// `<bucket_dir>/manifest.json`
pub fn manifest_path_at(bucket_dir: &Path) -> PathBuf {
    bucket_dir.join(MANIFEST_FILE)
}

/// Load the manifest of the bucket at `bucket_dir`.
///
/// Returns an empty manifest if the bucket has never been written to.
pub fn load_at(bucket_dir: &Path) -> Result<Manifest, SyncError> {
    let path = manifest_path_at(bucket_dir);
    if !path.exists() {
        return Ok(Manifest::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save the manifest atomically.
///
/// Writes to `manifest.json.tmp` then renames to `manifest.json`.
pub fn save_at(bucket_dir: &Path, manifest: &Manifest) -> Result<(), SyncError> {
    std::fs::create_dir_all(bucket_dir).map_err(|e| io_err(bucket_dir, e))?;

    let path = manifest_path_at(bucket_dir);
    let json = serde_json::to_string_pretty(manifest)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}
