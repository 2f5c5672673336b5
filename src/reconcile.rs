// src/reconcile.rs

//! Pruning of local trees against a manifest
//!
//! The reconciler lists every regular file under a root, computes
//! `actual - manifest` and removes the difference. Directories and symbolic
//! links are never candidates. A path in the manifest is never removed,
//! whether or not it exists locally, so a failed transfer cannot cascade into
//! deletions. Running it twice without an intervening transfer removes
//! nothing the second time.
//!
//! Both sides are compared in the canonical form of
//! [`crate::manifest::canonical_relative`]: root-relative, `/` separators,
//! no leading separator.

use crate::error::{Error, Result};
use crate::manifest::PathManifest;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// A regular file found under a root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Canonical root-relative path
    pub relative: String,
    pub path: PathBuf,
}

/// Files removed (or, in dry-run mode, that would be removed)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<String>,
}

/// Removes files that are not in a manifest
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    dry_run: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report extras without deleting them
    pub fn dry_run(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Prune every regular file under `root` that is not in `manifest`
    pub fn prune(&self, root: &Path, manifest: &PathManifest) -> Result<PruneReport> {
        let actual = local_tree(root, None)?;
        self.remove_extras(root, actual, manifest)
    }

    /// Prune only below `root/subtree`; paths stay relative to `root`
    pub fn prune_within(
        &self,
        root: &Path,
        subtree: &str,
        manifest: &PathManifest,
    ) -> Result<PruneReport> {
        let actual = local_tree(root, Some(subtree))?;
        self.remove_extras(root, actual, manifest)
    }

    fn remove_extras(
        &self,
        root: &Path,
        actual: Vec<LocalFile>,
        manifest: &PathManifest,
    ) -> Result<PruneReport> {
        let mut report = PruneReport::default();

        for file in actual {
            if manifest.contains(&file.relative) {
                continue;
            }

            if self.dry_run {
                info!("Would prune {}", file.path.display());
            } else {
                match fs::remove_file(&file.path) {
                    Ok(()) => info!("Pruned {}", file.path.display()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        debug!("{} already gone", file.path.display());
                    }
                    Err(e) => {
                        return Err(Error::IoError(format!(
                            "cannot remove {}: {e}",
                            file.path.display()
                        )));
                    }
                }
            }
            report.removed.push(file.relative);
        }

        debug!(
            "Reconciled {}: {} extra files",
            root.display(),
            report.removed.len()
        );
        Ok(report)
    }

    /// Remove directories under `root/subtree` left empty by pruning
    ///
    /// `root/subtree` itself is kept. Returns the number of directories removed.
    pub fn prune_empty_dirs(&self, root: &Path, subtree: &str) -> Result<usize> {
        let base = root.join(subtree);
        if !base.is_dir() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in WalkDir::new(&base).min_depth(1).contents_first(true) {
            let entry = entry.map_err(walk_error)?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let is_empty = fs::read_dir(entry.path())?.next().is_none();
            if !is_empty {
                continue;
            }
            if self.dry_run {
                info!("Would remove empty directory {}", entry.path().display());
            } else {
                fs::remove_dir(entry.path())?;
                debug!("Removed empty directory {}", entry.path().display());
            }
            removed += 1;
        }
        Ok(removed)
    }
}

/// Regular files under `root` (or `root/subtree`), sorted by path
///
/// A missing root yields an empty tree. Symbolic links are not followed and
/// are not listed.
pub fn local_tree(root: &Path, subtree: Option<&str>) -> Result<Vec<LocalFile>> {
    let base = match subtree {
        Some(sub) => root.join(sub),
        None => root.to_path_buf(),
    };
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&base).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(walk_error)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = relative_key(root, entry.path())?;
        files.push(LocalFile {
            relative,
            path: entry.into_path(),
        });
    }
    Ok(files)
}

/// Canonical relative form of `path` under `root`
fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        Error::InvalidPath(format!("{} is outside {}", path.display(), root.display()))
    })?;

    let mut segments = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(Error::InvalidPath(format!(
                    "unexpected component in {}",
                    path.display()
                )));
            }
        }
    }
    Ok(segments.join("/"))
}

fn walk_error(e: walkdir::Error) -> Error {
    let path = e
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    match e.into_io_error() {
        Some(io) => Error::IoError(format!("cannot list {path}: {io}")),
        None => Error::IoError(format!("filesystem loop at {path}")),
    }
}
