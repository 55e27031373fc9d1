pub mod cover;
pub mod deploy;
pub mod diff;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use sitesync_core::config::{self, LoadedConfig};

/// Config location and bucket root, shared by `deploy` and `diff`.
#[derive(Args, Debug)]
pub struct SiteArgs {
    /// The .s3_website.yaml configuration file or the directory containing it.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Directory holding the directory-backed buckets.
    #[arg(long, env = "SITESYNC_BUCKET_ROOT")]
    pub bucket_root: PathBuf,

    /// Treat every existing object as modified.
    #[arg(long, short = 'f')]
    pub force: bool,
}

impl SiteArgs {
    pub fn load(&self) -> Result<LoadedConfig> {
        load_config(&self.path)
    }
}

fn load_config(path: &Path) -> Result<LoadedConfig> {
    config::load_at(path)
        .with_context(|| format!("failed to load config from '{}'", path.display()))
}
