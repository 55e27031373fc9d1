//! Deploy pipeline shared by `sitesync deploy` and `sitesync diff`.
//!
//! 1. Scan the local site and list the bucket.
//! 2. Diff the two inventories.
//! 3. Resolve headers for every upload.
//! 4. Minimize the invalidation patterns for added ∪ modified ∪ removed.
//! 5. Unless dry-run: put, delete, flush, then submit invalidation batches.
//!
//! Any error aborts the run; nothing is retried.

use std::path::PathBuf;

use sitesync_core::config::LoadedConfig;
use sitesync_core::{ChangeSet, FileRecord, InvalidationPattern, Inventory, ObjectKey};

use crate::diff::{diff, diff_forced};
use crate::error::SyncError;
use crate::invalidation::{batches, cdn_path, minimize};
use crate::manifest::{ObjectMetadata, GZIP};
use crate::scan::{scan_site, LocalInventory};
use crate::target::{CdnInvalidator, StorageTarget};

/// Run options, mirroring the CLI flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Upload every local file even when its fingerprint is unchanged.
    pub force: bool,
    /// Compute everything, write nothing.
    pub dry_run: bool,
}

/// One object to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub record: FileRecord,
    pub source: PathBuf,
    pub metadata: ObjectMetadata,
    /// `true` when the key already exists in the bucket.
    pub replace: bool,
}

/// Everything a deploy would do, computed without side effects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployPlan {
    pub changes: ChangeSet,
    pub uploads: Vec<Upload>,
    pub deletions: Vec<ObjectKey>,
    pub patterns: Vec<InvalidationPattern>,
    /// Rendered CDN paths; empty when no distribution is configured.
    pub invalidation_paths: Vec<String>,
}

impl DeployPlan {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Outcome of [`deploy`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub plan: DeployPlan,
    pub dry_run: bool,
    /// Ids returned by the CDN, one per submitted batch.
    pub invalidation_ids: Vec<String>,
}

/// Build a plan from already-materialized inventories.
pub fn plan(
    loaded: &LoadedConfig,
    local: &LocalInventory,
    remote: &Inventory,
    force: bool,
) -> Result<DeployPlan, SyncError> {
    let changes = if force {
        diff_forced(&local.records, remote)
    } else {
        diff(&local.records, remote)
    };

    let mut uploads = Vec::with_capacity(changes.added.len() + changes.modified.len());
    for key in changes.uploads() {
        let record = local
            .records
            .get(key)
            .cloned()
            .ok_or_else(|| SyncError::MissingSource(key.to_string()))?;
        let metadata = ObjectMetadata {
            content_type: Some(content_type_for(key).to_string()),
            cache_control: loaded.cache_rules.resolve(key).map(str::to_string),
            content_encoding: is_compressible(key).then(|| GZIP.to_string()),
        };
        uploads.push(Upload {
            source: local.source(key)?.to_path_buf(),
            replace: changes.modified.contains(key),
            record,
            metadata,
        });
    }
    let deletions: Vec<ObjectKey> = changes.removed.iter().cloned().collect();

    let patterns = if changes.is_empty() {
        Vec::new()
    } else {
        minimize(changes.changed_keys())
    };
    let invalidation_paths = match loaded.config.cloudfront_distribution_id {
        Some(_) => {
            let index = loaded.config.index_document.as_deref();
            patterns.iter().map(|p| cdn_path(p, index)).collect()
        }
        None => Vec::new(),
    };

    Ok(DeployPlan {
        changes,
        uploads,
        deletions,
        patterns,
        invalidation_paths,
    })
}

/// Scan, diff and, unless dry-run, apply the plan to `target` and `cdn`.
pub fn deploy(
    loaded: &LoadedConfig,
    target: &mut dyn StorageTarget,
    cdn: Option<&mut dyn CdnInvalidator>,
    options: DeployOptions,
) -> Result<DeployReport, SyncError> {
    let site_dir = loaded.site_dir();
    tracing::info!("site: {}", site_dir.display());
    let local = scan_site(&site_dir)?;
    let remote = target.list()?;
    let plan = plan(loaded, &local, &remote, options.force)?;

    let prefix = if options.dry_run { "[dry-run] " } else { "" };
    for key in &plan.deletions {
        tracing::info!("{prefix}deleting {key}");
        if !options.dry_run {
            target.delete(key)?;
        }
    }
    for upload in &plan.uploads {
        let verb = if upload.replace { "uploading" } else { "creating" };
        tracing::info!("{prefix}{verb} {}", upload.record.key);
        if let Some(cc) = &upload.metadata.cache_control {
            tracing::debug!("using cache control: {cc}");
        }
        if upload.metadata.content_encoding.is_some() {
            tracing::debug!("compressing {}", upload.record.key);
        }
        if !options.dry_run {
            target.put(
                &upload.record.key,
                &upload.source,
                &upload.record,
                &upload.metadata,
            )?;
        }
    }
    if !options.dry_run {
        target.flush()?;
    }
    tracing::info!("bucket update done");

    let mut invalidation_ids = Vec::new();
    if let Some(distribution_id) = loaded.config.cloudfront_distribution_id.as_deref() {
        if plan.invalidation_paths.is_empty() {
            tracing::info!("nothing updated, skipping invalidation");
        } else {
            for path in &plan.invalidation_paths {
                tracing::info!("{prefix}preparing to invalidate {path}");
            }
            if !options.dry_run {
                if let Some(cdn) = cdn {
                    let size = loaded.config.invalidation_batch_size();
                    for batch in batches(&plan.invalidation_paths, size) {
                        let id = cdn.invalidate(distribution_id, &batch)?;
                        tracing::info!("created invalidation request {id} ({} paths)", batch.len());
                        invalidation_ids.push(id);
                    }
                } else {
                    tracing::warn!("no CDN client configured; {distribution_id} not invalidated");
                }
            }
        }
    }

    Ok(DeployReport {
        plan,
        dry_run: options.dry_run,
        invalidation_ids,
    })
}

/// Extensions uploaded with `Content-Encoding: gzip`.
pub const COMPRESSED_EXTENSIONS: &[&str] = &["txt", "html", "css", "js", "json", "xml", "rss"];

fn extension(key: &ObjectKey) -> String {
    key.file_name()
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn is_compressible(key: &ObjectKey) -> bool {
    COMPRESSED_EXTENSIONS.contains(&extension(key).as_str())
}

/// MIME type from the key's extension; `application/octet-stream` otherwise.
pub fn content_type_for(key: &ObjectKey) -> &'static str {
    match extension(key).as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "rss" => "application/rss+xml",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
