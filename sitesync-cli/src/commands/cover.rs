//! `sitesync cover <KEY>...` — minimal patterns for an explicit key list.

use anyhow::{Context, Result};
use clap::Args;

use sitesync_core::ObjectKey;
use sitesync_sync::{cdn_path, minimize};

/// Arguments for `sitesync cover`.
#[derive(Args, Debug)]
pub struct CoverArgs {
    /// Object keys (relative, slash-separated).
    #[arg(required = true)]
    pub keys: Vec<String>,

    /// Print CDN paths (leading `/`) instead of patterns.
    #[arg(long)]
    pub paths: bool,

    /// Index document name used when rendering CDN paths.
    #[arg(long, requires = "paths")]
    pub index_document: Option<String>,
}

impl CoverArgs {
    pub fn run(self) -> Result<()> {
        let keys = self
            .keys
            .iter()
            .map(|raw| ObjectKey::parse(raw).with_context(|| format!("rejected key '{raw}'")))
            .collect::<Result<Vec<_>>>()?;

        for pattern in minimize(&keys) {
            if self.paths {
                println!("{}", cdn_path(&pattern, self.index_document.as_deref()));
            } else {
                println!("{pattern}");
            }
        }
        Ok(())
    }
}
