//! sitesync core library — key space model, domain types, site config, errors.
//!
//! Public API surface:
//! - [`key`] — segmentation and wildcard joining of object keys
//! - [`types`] — [`ObjectKey`], [`FileRecord`], [`ChangeSet`], [`InvalidationPattern`]
//! - [`config`] — `.s3_website.yaml` loading
//! - [`cache_rules`] — first-match `Cache-Control` rules
//! - [`error`] — [`InvalidKey`], [`ConfigError`]

pub mod cache_rules;
pub mod config;
pub mod error;
pub mod key;
pub mod types;

pub use error::{ConfigError, InvalidKey, KeyDefect};
pub use types::{ChangeSet, FileRecord, Fingerprint, InvalidationPattern, Inventory, ObjectKey};
