//! `sitesync deploy [PATH]` — sync the site into its bucket.

use anyhow::{Context, Result};
use clap::Args;

use sitesync_sync::{
    deploy, CdnInvalidator, DeployOptions, DeployReport, DirectoryTarget, JournalInvalidator,
};

use super::SiteArgs;

/// Arguments for `sitesync deploy`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub site: SiteArgs,

    /// Show what would be uploaded, deleted and invalidated without doing it.
    #[arg(long, short = 'n')]
    pub dry_run: bool,
}

impl DeployArgs {
    pub fn run(self) -> Result<()> {
        let loaded = self.site.load()?;
        let bucket = loaded.config.s3_bucket.clone();
        tracing::info!("connecting to bucket {bucket}...");

        let mut target = DirectoryTarget::open(&self.site.bucket_root, &bucket)
            .with_context(|| format!("failed to open bucket '{bucket}'"))?;
        let mut journal = JournalInvalidator::new(&self.site.bucket_root);
        let cdn: Option<&mut dyn CdnInvalidator> = Some(&mut journal);

        let options = DeployOptions {
            force: self.site.force,
            dry_run: self.dry_run,
        };
        let report = deploy(&loaded, &mut target, cdn, options)
            .with_context(|| format!("deploy failed for '{bucket}'"))?;

        print_report(&bucket, &report);
        Ok(())
    }
}

fn print_report(bucket: &str, report: &DeployReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let plan = &report.plan;

    if plan.is_noop() {
        println!("{prefix}✓ '{bucket}' — nothing to do");
        return;
    }

    println!(
        "{prefix}✓ '{bucket}' deployed ({} uploaded, {} deleted, {} invalidation path(s))",
        plan.uploads.len(),
        plan.deletions.len(),
        plan.invalidation_paths.len(),
    );
    for upload in &plan.uploads {
        let marker = if upload.replace { "✎" } else { "+" };
        println!("  {marker}  {}", upload.record.key);
    }
    for key in &plan.deletions {
        println!("  -  {key}");
    }
    for path in &plan.invalidation_paths {
        println!("  ⟳  {path}");
    }
    for id in &report.invalidation_ids {
        println!("  invalidation request: {id}");
    }
}
