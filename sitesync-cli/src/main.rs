//! sitesync — static site deployment with minimal CDN invalidation.
//!
//! # Usage
//!
//! ```text
//! sitesync deploy [PATH] --bucket-root <DIR> [--force] [--dry-run]
//! sitesync diff [PATH] --bucket-root <DIR> [--force] [--json]
//! sitesync cover <KEY>...
//! ```
//!
//! `PATH` is the `.s3_website.yaml` file or the directory containing it
//! (default: current directory).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{cover::CoverArgs, deploy::DeployArgs, diff::DiffArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "sitesync",
    version,
    about = "Deploy a static site to a bucket and invalidate only what changed",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload changed files, delete removed ones, and invalidate the CDN.
    Deploy(DeployArgs),

    /// Show what deploy would change and which paths it would invalidate.
    Diff(DiffArgs),

    /// Print the minimal invalidation patterns covering the given keys.
    Cover(CoverArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Deploy(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Cover(args) => args.run(),
    }
}

/// Log to stderr so command output on stdout stays parseable.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
