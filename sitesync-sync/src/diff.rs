//! Change detection between the local site inventory and the bucket.
//!
//! Each key of either inventory lands in exactly one bucket: added, modified,
//! removed, or unchanged (dropped). Disjointness follows from the single pass
//! over the union of keys, not from deduplication afterwards.

use sitesync_core::{ChangeSet, Inventory};

/// Classify every key of `local` and `remote`.
///
/// A key present on both sides is modified only when the fingerprints differ.
pub fn diff(local: &Inventory, remote: &Inventory) -> ChangeSet {
    classify(local, remote, false)
}

/// Like [`diff`], but every key present on both sides counts as modified
/// regardless of fingerprint. Used to re-upload the whole site.
pub fn diff_forced(local: &Inventory, remote: &Inventory) -> ChangeSet {
    classify(local, remote, true)
}

fn classify(local: &Inventory, remote: &Inventory, force: bool) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (key, record) in local {
        match remote.get(key) {
            None => {
                changes.added.insert(key.clone());
            }
            Some(existing) if force || existing.fingerprint != record.fingerprint => {
                changes.modified.insert(key.clone());
            }
            Some(_) => {
                tracing::debug!("not modified, skipping {key}");
            }
        }
    }

    for key in remote.keys() {
        if !local.contains_key(key) {
            changes.removed.insert(key.clone());
        }
    }

    changes
}
