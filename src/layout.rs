// src/layout.rs

//! On-disk layout of the work and mirror roots
//!
//! ```text
//! work_root/<key>/indexes          index list file
//! work_root/<key>/packages         package list file
//! work_root/<key>/dists/...        staged metadata
//! mirror_root/<key>/dists/...      published metadata (replaced on publish)
//! mirror_root/<key>/pool/...       published packages
//! ```

use crate::config::{MirrorSettings, SourceGroup};
use std::path::{Path, PathBuf};

/// Name of the metadata subtree inside a staging or published root
pub const METADATA_DIR: &str = "dists";

/// Name of the package subtree inside a published root
pub const POOL_DIR: &str = "pool";

/// Roots for every mirror job in a run
#[derive(Debug, Clone)]
pub struct MirrorLayout {
    work_root: PathBuf,
    mirror_root: PathBuf,
}

impl MirrorLayout {
    pub fn new(work_root: impl Into<PathBuf>, mirror_root: impl Into<PathBuf>) -> Self {
        Self {
            work_root: work_root.into(),
            mirror_root: mirror_root.into(),
        }
    }

    pub fn from_settings(settings: &MirrorSettings) -> Self {
        Self::new(&settings.work_root, &settings.mirror_root)
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    pub fn mirror_root(&self) -> &Path {
        &self.mirror_root
    }

    /// Paths used by one source group
    pub fn paths_for(&self, group: &SourceGroup) -> SourcePaths {
        self.paths_for_key(group.key())
    }

    pub fn paths_for_key(&self, key: &str) -> SourcePaths {
        let work_dir = self.work_root.join(key);
        let published_dir = self.mirror_root.join(key);
        SourcePaths {
            index_list: work_dir.join("indexes"),
            package_list: work_dir.join("packages"),
            work_dir,
            published_dir,
        }
    }
}

/// Per-source staging and publish locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    /// Staging root; index files land here
    pub work_dir: PathBuf,
    /// Published root; package files land here
    pub published_dir: PathBuf,
    pub index_list: PathBuf,
    pub package_list: PathBuf,
}

impl SourcePaths {
    pub fn staged_metadata(&self) -> PathBuf {
        self.work_dir.join(METADATA_DIR)
    }

    pub fn published_metadata(&self) -> PathBuf {
        self.published_dir.join(METADATA_DIR)
    }
}
