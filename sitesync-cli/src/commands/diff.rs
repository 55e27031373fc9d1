//! `sitesync diff [PATH]` — show the change set and invalidation paths.
//!
//! Reads the site and the bucket; writes nothing.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use sitesync_sync::{plan, scan_site, DirectoryTarget, StorageTarget};

use super::SiteArgs;

/// Arguments for `sitesync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub site: SiteArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct DiffJson<'a> {
    added: Vec<&'a str>,
    modified: Vec<&'a str>,
    removed: Vec<&'a str>,
    patterns: Vec<String>,
    invalidation_paths: &'a [String],
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let loaded = self.site.load()?;
        let local = scan_site(&loaded.site_dir()).with_context(|| {
            format!("failed to scan site '{}'", loaded.site_dir().display())
        })?;
        let target = DirectoryTarget::open(&self.site.bucket_root, &loaded.config.s3_bucket)
            .context("failed to open bucket")?;
        let remote = target.list().context("failed to list bucket")?;
        let plan = plan(&loaded, &local, &remote, self.site.force).context("failed to plan")?;

        if self.json {
            let payload = DiffJson {
                added: plan.changes.added.iter().map(|k| k.as_str()).collect(),
                modified: plan.changes.modified.iter().map(|k| k.as_str()).collect(),
                removed: plan.changes.removed.iter().map(|k| k.as_str()).collect(),
                patterns: plan.patterns.iter().map(ToString::to_string).collect(),
                invalidation_paths: &plan.invalidation_paths,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize diff JSON")?
            );
            return Ok(());
        }

        if plan.is_noop() {
            println!("No differences for '{}'.", loaded.config.s3_bucket);
            return Ok(());
        }

        for key in &plan.changes.added {
            println!("{} {key}", "+".green());
        }
        for key in &plan.changes.modified {
            println!("{} {key}", "~".yellow());
        }
        for key in &plan.changes.removed {
            println!("{} {key}", "-".red());
        }
        if !plan.invalidation_paths.is_empty() {
            println!("{}", "invalidate:".bright_black());
            for path in &plan.invalidation_paths {
                println!("  {path}");
            }
        }
        Ok(())
    }
}
