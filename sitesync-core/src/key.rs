//! Key space model: slash-delimited object keys as segment sequences.
//!
//! Both functions are pure. [`segments`] is the single place where key
//! syntax is validated; everything downstream works on [`ObjectKey`]s that
//! already passed through it.
//!
//! [`ObjectKey`]: crate::types::ObjectKey

use crate::error::{InvalidKey, KeyDefect};

/// Split `key` into its `/`-separated segments.
///
/// Rejects empty keys, keys with a leading `/`, and keys containing an empty
/// segment (`a//b`, or a trailing `a/`).
pub fn segments(key: &str) -> Result<Vec<&str>, InvalidKey> {
    if key.is_empty() {
        return Err(InvalidKey::new(key, KeyDefect::Empty));
    }
    if key.starts_with('/') {
        return Err(InvalidKey::new(key, KeyDefect::LeadingSlash));
    }
    let parts: Vec<&str> = key.split('/').collect();
    if parts.iter().any(|s| s.is_empty()) {
        return Err(InvalidKey::new(key, KeyDefect::EmptySegment));
    }
    Ok(parts)
}

/// Join prefix segments with `/` and append the `/*` wildcard marker.
///
/// Only meaningful for directory prefixes; a full file key is never turned
/// into a wildcard by callers.
pub fn wildcard<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = join(segments);
    out.push_str("/*");
    out
}

pub(crate) fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for (i, seg) in segments.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(seg.as_ref());
    }
    out
}
