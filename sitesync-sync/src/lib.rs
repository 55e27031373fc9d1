//! # sitesync-sync
//!
//! Change detection, invalidation minimization and the deploy pipeline.
//!
//! Call [`diff`] to classify local files against the bucket, [`minimize`] to
//! turn the changed keys into the fewest CDN invalidation patterns, or
//! [`pipeline::deploy`] to run the whole sync against a [`StorageTarget`].

pub mod diff;
pub mod error;
pub mod invalidation;
pub mod manifest;
pub mod pipeline;
pub mod scan;
pub mod target;

pub use diff::{diff, diff_forced};
pub use error::SyncError;
pub use invalidation::{batches, cdn_path, is_covered, minimize};
pub use pipeline::{deploy, plan, DeployOptions, DeployPlan, DeployReport, Upload};
pub use scan::{scan_site, LocalInventory};
pub use target::{CdnInvalidator, DirectoryTarget, JournalInvalidator, StorageTarget};
