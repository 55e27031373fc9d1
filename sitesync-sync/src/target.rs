//! Storage and CDN targets.
//!
//! The deploy pipeline talks to the bucket and the CDN only through
//! [`StorageTarget`] and [`CdnInvalidator`]. The implementations here keep
//! everything on the local filesystem:
//!
//! ```text
//! <bucket_root>/
//!   <bucket>/
//!     manifest.json           (metadata index, see `manifest`)
//!     objects/<key>           (object content)
//!   invalidations/
//!     <distribution_id>.jsonl (one line per invalidation request)
//! ```
//!
//! ## `put` protocol
//!
//! 1. Copy the source to `<object>.sitesync.tmp`, gzip-compressed when the
//!    metadata says `content_encoding: gzip`.
//! 2. Rename to the final object path (atomic on POSIX).
//! 3. Record fingerprint and headers in the in-memory manifest.
//!
//! The manifest is written once, by [`StorageTarget::flush`].

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::{write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};

use sitesync_core::{FileRecord, Inventory, ObjectKey};

use crate::error::{io_err, SyncError};
use crate::manifest::{self, Manifest, ManifestEntry, ObjectMetadata, GZIP};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An object store holding the deployed site.
pub trait StorageTarget {
    /// Current contents of the bucket.
    fn list(&self) -> Result<Inventory, SyncError>;

    /// Store `source` under `key`, replacing any existing object.
    fn put(
        &mut self,
        key: &ObjectKey,
        source: &Path,
        record: &FileRecord,
        metadata: &ObjectMetadata,
    ) -> Result<(), SyncError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn delete(&mut self, key: &ObjectKey) -> Result<(), SyncError>;

    /// Persist any buffered state. Called once after all puts and deletes.
    fn flush(&mut self) -> Result<(), SyncError> {
        Ok(())
    }
}

/// A CDN that accepts invalidation requests.
pub trait CdnInvalidator {
    /// Submit one batch of paths; returns the request id.
    fn invalidate(&mut self, distribution_id: &str, paths: &[String])
        -> Result<String, SyncError>;
}

// ---------------------------------------------------------------------------
// DirectoryTarget
// ---------------------------------------------------------------------------

/// A bucket stored as a plain directory tree.
#[derive(Debug)]
pub struct DirectoryTarget {
    bucket_dir: PathBuf,
    manifest: Manifest,
}

impl DirectoryTarget {
    /// Open (or lazily create) bucket `bucket` under `bucket_root`.
    pub fn open(bucket_root: &Path, bucket: &str) -> Result<Self, SyncError> {
        let bucket_dir = bucket_root.join(bucket);
        let manifest = manifest::load_at(&bucket_dir)?;
        Ok(Self {
            bucket_dir,
            manifest,
        })
    }

    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.bucket_dir.join("objects")
    }

    pub fn metadata(&self, key: &ObjectKey) -> Option<&ObjectMetadata> {
        self.manifest.objects.get(key).map(|e| &e.metadata)
    }

    /// Filesystem path of `key`'s content.
    ///
    /// Keys arriving from a manifest are not trusted to stay inside the
    /// bucket; `.` and `..` segments are refused.
    pub fn object_path(&self, key: &ObjectKey) -> Result<PathBuf, SyncError> {
        let mut path = self.objects_dir();
        for segment in key.segments() {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(_)), None) => path.push(segment),
                _ => {
                    return Err(io_err(
                        &path,
                        std::io::Error::other(format!("unsafe object key {key}")),
                    ))
                }
            }
        }
        Ok(path)
    }
}

impl StorageTarget for DirectoryTarget {
    fn list(&self) -> Result<Inventory, SyncError> {
        Ok(self.manifest.inventory())
    }

    fn put(
        &mut self,
        key: &ObjectKey,
        source: &Path,
        record: &FileRecord,
        metadata: &ObjectMetadata,
    ) -> Result<(), SyncError> {
        let path = self.object_path(key)?;
        let tmp = PathBuf::from(format!("{}.sitesync.tmp", path.display()));
        let compress = metadata.content_encoding.as_deref() == Some(GZIP);
        copy_atomic(source, &path, &tmp, compress)?;

        self.manifest.objects.insert(
            key.clone(),
            ManifestEntry {
                fingerprint: record.fingerprint.clone(),
                size: record.size,
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    fn delete(&mut self, key: &ObjectKey) -> Result<(), SyncError> {
        let path = self.object_path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&path, e)),
        }
        prune_empty_parents(&path, &self.objects_dir());
        self.manifest.objects.remove(key);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SyncError> {
        self.manifest.synced_at = Utc::now();
        manifest::save_at(&self.bucket_dir, &self.manifest)
    }
}

fn copy_atomic(source: &Path, dest: &Path, tmp: &Path, compress: bool) -> Result<(), SyncError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if compress {
        if let Err(e) = gzip_to(source, tmp) {
            let _ = std::fs::remove_file(tmp);
            return Err(e);
        }
    } else {
        std::fs::copy(source, tmp).map_err(|e| io_err(source, e))?;
    }
    if let Err(e) = std::fs::rename(tmp, dest) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(dest, e));
    }
    Ok(())
}

fn gzip_to(source: &Path, dest: &Path) -> Result<(), SyncError> {
    let mut input = File::open(source).map_err(|e| io_err(source, e))?;
    let output = File::create(dest).map_err(|e| io_err(dest, e))?;
    let mut encoder = GzEncoder::new(output, Compression::best());
    std::io::copy(&mut input, &mut encoder).map_err(|e| io_err(dest, e))?;
    encoder.finish().map_err(|e| io_err(dest, e))?;
    Ok(())
}

/// Remove now-empty directories between `path` and `stop` (exclusive).
fn prune_empty_parents(path: &Path, stop: &Path) {
    let mut dir = path.parent();
    while let Some(d) = dir {
        if d == stop || !d.starts_with(stop) {
            break;
        }
        // Fails on non-empty directories, which ends the walk.
        if std::fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

// ---------------------------------------------------------------------------
// JournalInvalidator
// ---------------------------------------------------------------------------

/// One submitted invalidation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationRecord {
    pub id: String,
    pub distribution_id: String,
    pub created_at: DateTime<Utc>,
    pub paths: Vec<String>,
}

/// Records invalidation requests as JSON lines instead of calling a CDN.
#[derive(Debug)]
pub struct JournalInvalidator {
    dir: PathBuf,
    submitted: usize,
}

impl JournalInvalidator {
    pub fn new(bucket_root: &Path) -> Self {
        Self {
            dir: bucket_root.join("invalidations"),
            submitted: 0,
        }
    }

    pub fn journal_path(&self, distribution_id: &str) -> PathBuf {
        self.dir.join(format!("{distribution_id}.jsonl"))
    }

    /// Every request recorded so far for `distribution_id`, oldest first.
    pub fn read(&self, distribution_id: &str) -> Result<Vec<InvalidationRecord>, SyncError> {
        let path = self.journal_path(distribution_id);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(io_err(&path, e)),
        };
        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(SyncError::from))
            .collect()
    }
}

impl CdnInvalidator for JournalInvalidator {
    fn invalidate(
        &mut self,
        distribution_id: &str,
        paths: &[String],
    ) -> Result<String, SyncError> {
        let created_at = Utc::now();
        self.submitted += 1;
        let record = InvalidationRecord {
            id: format!("I{}-{}", created_at.format("%Y%m%d%H%M%S%3f"), self.submitted),
            distribution_id: distribution_id.to_string(),
            created_at,
            paths: paths.to_vec(),
        };

        std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let path = self.journal_path(distribution_id);
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| io_err(&path, e))?;

        Ok(record.id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::fingerprint_file;
    use flate2::read::GzDecoder;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn key(s: &str) -> ObjectKey {
        ObjectKey::parse(s).unwrap()
    }

    fn source_file(dir: &Path, name: &str, content: &str) -> (PathBuf, FileRecord) {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        let (fp, size) = fingerprint_file(&path).unwrap();
        (path, FileRecord::new(key(name), fp, size))
    }

    #[test]
    fn put_writes_object_and_tracks_it() {
        let root = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let (path, record) = source_file(src.path(), "page.html", "hello");

        let mut target = DirectoryTarget::open(root.path(), "site").unwrap();
        let k = key("blog/2024/page.html");
        let meta = ObjectMetadata {
            content_type: Some("text/html".into()),
            cache_control: Some("max-age=60".into()),
            content_encoding: None,
        };
        target.put(&k, &path, &record, &meta).unwrap();

        let stored = target.object_path(&k).unwrap();
        assert_eq!(fs::read_to_string(&stored).unwrap(), "hello");
        assert!(!PathBuf::from(format!("{}.sitesync.tmp", stored.display())).exists());
        assert_eq!(target.metadata(&k), Some(&meta));
        assert_eq!(target.list().unwrap()[&k].fingerprint, record.fingerprint);
    }

    #[test]
    fn gzip_encoded_object_decompresses_to_source() {
        let root = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let css = "body { color: #333; }\n".repeat(50);
        let (path, record) = source_file(src.path(), "site.css", &css);

        let mut target = DirectoryTarget::open(root.path(), "site").unwrap();
        let k = key("css/site.css");
        let meta = ObjectMetadata {
            content_type: Some("text/css".into()),
            cache_control: None,
            content_encoding: Some(GZIP.into()),
        };
        target.put(&k, &path, &record, &meta).unwrap();

        let stored = fs::read(target.object_path(&k).unwrap()).unwrap();
        assert_eq!(&stored[..2], &[0x1f, 0x8b]);
        assert!(stored.len() < css.len());

        let mut decoded = String::new();
        GzDecoder::new(stored.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, css);
        assert_eq!(target.metadata(&k), Some(&meta));
        assert_eq!(target.list().unwrap()[&k].size, record.size);
    }

    #[test]
    fn manifest_persists_only_after_flush() {
        let root = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let (path, record) = source_file(src.path(), "a.txt", "a");

        let mut target = DirectoryTarget::open(root.path(), "b").unwrap();
        target
            .put(&key("a.txt"), &path, &record, &ObjectMetadata::default())
            .unwrap();
        assert!(DirectoryTarget::open(root.path(), "b").unwrap().list().unwrap().is_empty());

        target.flush().unwrap();
        let reopened = DirectoryTarget::open(root.path(), "b").unwrap();
        assert_eq!(reopened.list().unwrap().len(), 1);
    }

    #[test]
    fn delete_removes_object_and_empty_dirs() {
        let root = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let (path, record) = source_file(src.path(), "x.css", "x");

        let mut target = DirectoryTarget::open(root.path(), "b").unwrap();
        let k = key("deep/nested/x.css");
        target
            .put(&k, &path, &record, &ObjectMetadata::default())
            .unwrap();
        target.delete(&k).unwrap();

        assert!(!target.objects_dir().join("deep").exists());
        assert!(target.objects_dir().exists());
        assert!(target.list().unwrap().is_empty());
        // Deleting again is a no-op.
        target.delete(&k).unwrap();
    }

    #[test]
    fn dot_segments_are_refused() {
        let root = TempDir::new().unwrap();
        let target = DirectoryTarget::open(root.path(), "b").unwrap();
        assert!(target.object_path(&key("../escape.txt")).is_err());
        assert!(target.object_path(&key("a/./b")).is_err());
        assert!(target.object_path(&key("a/b")).is_ok());
    }

    #[test]
    fn journal_appends_one_line_per_request() {
        let root = TempDir::new().unwrap();
        let mut cdn = JournalInvalidator::new(root.path());
        let first = cdn.invalidate("E1", &["/a".to_string()]).unwrap();
        let second = cdn
            .invalidate("E1", &["/b/*".to_string(), "/c".to_string()])
            .unwrap();
        assert_ne!(first, second);

        let records = cdn.read("E1").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].paths, ["/a"]);
        assert_eq!(records[1].id, second);
        assert!(cdn.read("other").unwrap().is_empty());
    }
}
