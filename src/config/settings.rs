// src/config/settings.rs

//! Run settings
//!
//! Settings are read from an optional TOML file and then overridden by
//! command-line flags. The resulting value is built once at startup and
//! passed by reference to every component.
//!
//! ```toml
//! mirror_root = "/var/www/ubuntu_latest"
//! work_root = "/var/cache/debsync"
//! bandwidth_limit_kbs = 10000
//! jobs = 2
//! architectures = ["amd64", "i386"]
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings shared by every mirror job in a run
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorSettings {
    /// Root of the published mirror tree
    #[serde(default = "default_mirror_root")]
    pub mirror_root: PathBuf,

    /// Root of the staging area (list files and staged metadata)
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,

    /// Aggregate bandwidth ceiling in kilobytes per second
    #[serde(default = "default_bandwidth_limit")]
    pub bandwidth_limit_kbs: u32,

    /// Number of sources processed concurrently
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Architectures used for sources without an `arch=` option
    #[serde(default = "default_architectures")]
    pub architectures: Vec<String>,

    /// Log what would be pruned and published without touching either tree
    #[serde(default)]
    pub dry_run: bool,

    /// Remove directories left empty after pruning
    #[serde(default)]
    pub prune_empty_dirs: bool,

    /// Per-request timeout for the HTTP transport
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            mirror_root: default_mirror_root(),
            work_root: default_work_root(),
            bandwidth_limit_kbs: default_bandwidth_limit(),
            jobs: default_jobs(),
            architectures: default_architectures(),
            dry_run: false,
            prune_empty_dirs: false,
            http_timeout_secs: default_http_timeout(),
        }
    }
}

fn default_mirror_root() -> PathBuf {
    PathBuf::from("/var/www/ubuntu_latest")
}

fn default_work_root() -> PathBuf {
    PathBuf::from("work")
}

fn default_bandwidth_limit() -> u32 {
    10_000
}

fn default_jobs() -> usize {
    1
}

fn default_architectures() -> Vec<String> {
    vec!["amd64".to_string()]
}

fn default_http_timeout() -> u64 {
    30
}

impl MirrorSettings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("cannot read settings {}: {e}", path.display()))
        })?;

        let settings: MirrorSettings = toml::from_str(&content).map_err(|e| {
            Error::ConfigError(format!("cannot parse settings {}: {e}", path.display()))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.bandwidth_limit_kbs == 0 {
            return Err(Error::ConfigError(
                "bandwidth_limit_kbs must be greater than zero".to_string(),
            ));
        }
        if self.jobs == 0 {
            return Err(Error::ConfigError("jobs must be at least 1".to_string()));
        }
        if self.architectures.is_empty() {
            return Err(Error::ConfigError(
                "at least one architecture is required".to_string(),
            ));
        }
        if self.mirror_root == self.work_root {
            return Err(Error::ConfigError(
                "mirror_root and work_root must be different directories".to_string(),
            ));
        }
        Ok(())
    }
}
