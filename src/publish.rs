// src/publish.rs

//! Snapshot publishing of the metadata subtree
//!
//! Publishing never rewrites a published file in place. The staged `dists`
//! tree is cloned with hard links into a sibling `.dists.new` directory, the
//! live tree is renamed aside, the clone is renamed into place and the old
//! tree is removed. Readers see either the previous snapshot or the new one;
//! after a crash the worst case is a missing or stale `dists`, never a mix.
//!
//! Staging and publish roots must share a filesystem. A cross-device link
//! fails the publish; there is no copy fallback.

use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// What a publish linked into place
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub files: usize,
    pub symlinks: usize,
    pub directories: usize,
}

/// Replaces a published metadata tree with a hard-linked clone of a staged one
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotPublisher {
    dry_run: bool,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Publish `staged` as `published`
    pub fn publish(&self, staged: &Path, published: &Path) -> Result<PublishReport> {
        if !staged.is_dir() {
            return Err(Error::PublishError(format!(
                "staged tree {} does not exist",
                staged.display()
            )));
        }

        if self.dry_run {
            info!("Would publish {} to {}", staged.display(), published.display());
            return Ok(PublishReport::default());
        }

        let (incoming, outgoing) = sibling_paths(published)?;
        if let Some(parent) = incoming.parent() {
            fs::create_dir_all(parent)?;
        }
        remove_leftover(&incoming)?;
        remove_leftover(&outgoing)?;

        let report = match clone_tree(staged, &incoming) {
            Ok(report) => report,
            Err(e) => {
                let _ = fs::remove_dir_all(&incoming);
                return Err(e);
            }
        };

        swap_into_place(&incoming, published, &outgoing)?;

        info!(
            "Published {} ({} files, {} symlinks)",
            published.display(),
            report.files,
            report.symlinks
        );
        Ok(report)
    }
}

/// `.<name>.new` and `.<name>.old` next to `published`
fn sibling_paths(published: &Path) -> Result<(PathBuf, PathBuf)> {
    let name = published
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::InvalidPath(format!("{} has no file name", published.display()))
        })?;
    Ok((
        published.with_file_name(format!(".{name}.new")),
        published.with_file_name(format!(".{name}.old")),
    ))
}

/// Remove a temporary tree left behind by an interrupted publish
fn remove_leftover(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(_) => {
            warn!("Removing leftover {}", path.display());
            fs::remove_dir_all(path)?;
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Recreate `source` under `target` with hard links for regular files
fn clone_tree(source: &Path, target: &Path) -> Result<PublishReport> {
    let mut report = PublishReport::default();

    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::IoError(format!("cannot list staged tree: {e}")))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| Error::InvalidPath(entry.path().display().to_string()))?;
        let dest = target.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&dest)?;
            report.directories += 1;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            symlink(&link, &dest)?;
            report.symlinks += 1;
        } else if file_type.is_file() {
            hard_link(entry.path(), &dest)?;
            report.files += 1;
        } else {
            debug!("Skipping special file {}", entry.path().display());
        }
    }
    Ok(report)
}

fn hard_link(source: &Path, dest: &Path) -> Result<()> {
    match fs::hard_link(source, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => Err(Error::PublishError(format!(
            "{} and {} are on different filesystems; staging and mirror roots must share a volume",
            source.display(),
            dest.display()
        ))),
        Err(e) => Err(Error::PublishError(format!(
            "cannot link {} to {}: {e}",
            source.display(),
            dest.display()
        ))),
    }
}

#[cfg(unix)]
fn symlink(link: &Path, dest: &Path) -> Result<()> {
    std::os::unix::fs::symlink(link, dest)?;
    Ok(())
}

#[cfg(not(unix))]
fn symlink(link: &Path, dest: &Path) -> Result<()> {
    Err(Error::PublishError(format!(
        "cannot recreate symlink {} -> {} on this platform",
        dest.display(),
        link.display()
    )))
}

/// Rename `incoming` over `published`, keeping the old tree until it succeeds
fn swap_into_place(incoming: &Path, published: &Path, outgoing: &Path) -> Result<()> {
    let had_previous = match fs::symlink_metadata(published) {
        Ok(_) => {
            fs::rename(published, outgoing).map_err(|e| {
                Error::PublishError(format!("cannot move {} aside: {e}", published.display()))
            })?;
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = fs::rename(incoming, published) {
        if had_previous {
            let _ = fs::rename(outgoing, published);
        }
        let _ = fs::remove_dir_all(incoming);
        return Err(Error::PublishError(format!(
            "cannot move new snapshot into {}: {e}",
            published.display()
        )));
    }

    if had_previous {
        if let Err(e) = fs::remove_dir_all(outgoing) {
            warn!("Failed to remove previous snapshot {}: {}", outgoing.display(), e);
        }
    }
    Ok(())
}
