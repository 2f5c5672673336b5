// src/cli.rs
//! CLI definitions for debsync
//!
//! Flags override values from the optional `--config` TOML file, which in
//! turn override the built-in defaults.

use anyhow::{Context, Result};
use clap::Parser;
use debsync::MirrorSettings;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "debsync")]
#[command(version)]
#[command(about = "Bandwidth-limited partial mirror of Debian/Ubuntu repositories", long_about = None)]
pub struct Cli {
    /// Sources list describing what to mirror (`deb <url> <dist> <components...>`)
    pub sources: PathBuf,

    /// TOML settings file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Root of the published mirror
    #[arg(long, value_name = "DIR")]
    pub mirror_root: Option<PathBuf>,

    /// Root of the staging area
    #[arg(long, value_name = "DIR")]
    pub work_root: Option<PathBuf>,

    /// Aggregate bandwidth limit in KB/s
    #[arg(long, value_name = "KBPS")]
    pub bwlimit: Option<u32>,

    /// Number of sources mirrored concurrently
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Architecture for sources without an `arch=` option (repeatable)
    #[arg(short, long = "arch", value_name = "ARCH", value_delimiter = ',')]
    pub architectures: Vec<String>,

    /// Per-request timeout for HTTP sources, in seconds
    #[arg(long, value_name = "SECS")]
    pub http_timeout: Option<u64>,

    /// Fetch and report, but neither prune nor publish
    #[arg(long)]
    pub dry_run: bool,

    /// Remove directories left empty after pruning
    #[arg(long)]
    pub prune_empty_dirs: bool,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Default log filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Settings from the config file (if any) with flag overrides applied
    pub fn settings(&self) -> Result<MirrorSettings> {
        let mut settings = match &self.config {
            Some(path) => MirrorSettings::load(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => MirrorSettings::default(),
        };

        if let Some(root) = &self.mirror_root {
            settings.mirror_root = root.clone();
        }
        if let Some(root) = &self.work_root {
            settings.work_root = root.clone();
        }
        if let Some(limit) = self.bwlimit {
            settings.bandwidth_limit_kbs = limit;
        }
        if let Some(jobs) = self.jobs {
            settings.jobs = jobs;
        }
        if !self.architectures.is_empty() {
            settings.architectures = self.architectures.clone();
        }
        if let Some(timeout) = self.http_timeout {
            settings.http_timeout_secs = timeout;
        }
        settings.dry_run |= self.dry_run;
        settings.prune_empty_dirs |= self.prune_empty_dirs;

        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}
