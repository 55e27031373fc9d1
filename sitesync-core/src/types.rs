//! Domain types shared by the diff engine and the invalidation minimizer.
//!
//! Keys are validated once, at construction of [`ObjectKey`]; collections use
//! ordered maps and sets so every iteration is deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InvalidKey;
use crate::key;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A slash-delimited relative path naming one object, both in the local site
/// tree and in the bucket.
///
/// Invariant: non-empty, no leading `/`, no empty segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Validate `raw` and wrap it.
    pub fn parse(raw: &str) -> Result<Self, InvalidKey> {
        key::segments(raw)?;
        Ok(Self(raw.to_owned()))
    }

    /// Build a key from segments, validating the joined result.
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Result<Self, InvalidKey> {
        Self::parse(&key::join(segments))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key's segments. Cannot fail: the key was validated on construction.
    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.split('/')
    }

    /// Final segment (the file name).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Everything before the final segment, if the key has more than one.
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// Every segment-boundary prefix of this key, shortest first, ending with
    /// the key itself. `a/b/c` yields `a`, `a/b`, `a/b/c`.
    pub fn prefixes(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.0
            .match_indices('/')
            .map(|(i, _)| i)
            .chain(std::iter::once(self.0.len()))
            .map(|end| ObjectKey(self.0[..end].to_owned()))
    }

    /// Whether this key's segments start with all of `prefix`'s segments.
    pub fn starts_with_segments(&self, prefix: &ObjectKey) -> bool {
        let mut mine = self.segments();
        prefix.segments().all(|p| mine.next() == Some(p))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = InvalidKey;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        key::segments(&s)?;
        Ok(Self(s))
    }
}

impl From<ObjectKey> for String {
    fn from(k: ObjectKey) -> Self {
        k.0
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque content digest. Two records with equal fingerprints hold the same
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Records and inventories
// ---------------------------------------------------------------------------

/// One local file or remote object, captured once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub key: ObjectKey,
    pub fingerprint: Fingerprint,
    pub size: u64,
}

impl FileRecord {
    pub fn new(key: ObjectKey, fingerprint: impl Into<Fingerprint>, size: u64) -> Self {
        Self {
            key,
            fingerprint: fingerprint.into(),
            size,
        }
    }
}

/// Key → record mapping for one side of a sync (local tree or bucket).
pub type Inventory = BTreeMap<ObjectKey, FileRecord>;

/// Partition of the keys that differ between local and remote.
///
/// The three sets are pairwise disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: BTreeSet<ObjectKey>,
    pub modified: BTreeSet<ObjectKey>,
    pub removed: BTreeSet<ObjectKey>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    /// Every key whose cached copy is stale: added ∪ modified ∪ removed, in
    /// key order.
    pub fn changed_keys(&self) -> BTreeSet<&ObjectKey> {
        self.added
            .iter()
            .chain(&self.modified)
            .chain(&self.removed)
            .collect()
    }

    /// Keys that must be written to the bucket: added, then modified.
    pub fn uploads(&self) -> impl Iterator<Item = &ObjectKey> {
        self.added.iter().chain(&self.modified)
    }
}

// ---------------------------------------------------------------------------
// Invalidation patterns
// ---------------------------------------------------------------------------

/// One invalidation unit: a single key, or every key under a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationPattern {
    Exact(ObjectKey),
    Wildcard {
        prefix: ObjectKey,
        /// The prefix path is itself a changed object, not only a directory.
        includes_prefix_object: bool,
    },
}

impl InvalidationPattern {
    /// Whether invalidating this pattern purges `key`.
    pub fn covers(&self, key: &ObjectKey) -> bool {
        match self {
            InvalidationPattern::Exact(k) => k == key,
            InvalidationPattern::Wildcard { prefix, .. } => key.starts_with_segments(prefix),
        }
    }
}

impl fmt::Display for InvalidationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationPattern::Exact(k) => k.fmt(f),
            InvalidationPattern::Wildcard { prefix, .. } => {
                let segs: Vec<&str> = prefix.segments().collect();
                f.write_str(&key::wildcard(&segs))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
