// src/manifest/mod.rs

//! Path manifests
//!
//! A [`PathManifest`] is the authoritative list of files that must exist under
//! a staging or published root. Entries are kept in discovery order (which
//! only affects transfer scheduling) and are deduplicated on insert.
//!
//! Every entry is stored in one canonical form: root-relative, a single
//! leading `/`, `/` separators, no empty or `.` segments. Paths containing
//! `..` are rejected. Membership tests canonicalise the queried path the same way,
//! so `pool/a.deb`, `/pool/a.deb` and `./pool//a.deb` are the same entry.

mod index;
mod packages;
pub mod scanner;

pub use index::IndexManifestBuilder;
pub use packages::{PackageManifest, PackageManifestBuilder};

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Ordered, deduplicated set of root-relative file paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathManifest {
    entries: Vec<String>,
    members: HashSet<String>,
}

impl PathManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path; returns `false` if it was already present
    pub fn push(&mut self, path: &str) -> Result<bool> {
        let key = canonical_relative(path)
            .ok_or_else(|| Error::InvalidPath(format!("'{path}' is not a safe relative path")))?;
        if self.members.contains(&key) {
            return Ok(false);
        }
        self.entries.push(format!("/{key}"));
        self.members.insert(key);
        Ok(true)
    }

    /// Membership test after canonicalising `path`
    pub fn contains(&self, path: &str) -> bool {
        canonical_relative(path).is_some_and(|key| self.members.contains(&key))
    }

    /// Append every entry of `other` not already present
    pub fn extend_from(&mut self, other: &PathManifest) {
        for entry in &other.entries {
            let key = entry.trim_start_matches('/');
            if self.members.insert(key.to_string()) {
                self.entries.push(entry.clone());
            }
        }
    }

    /// Union of two manifests, `self` first
    pub fn union(&self, other: &PathManifest) -> PathManifest {
        let mut out = self.clone();
        out.extend_from(other);
        out
    }

    /// Entries with their leading `/`
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Entries without the leading `/`, relative to the root
    pub fn relative_paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.trim_start_matches('/'))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the manifest as a list file, one `/path` per line
    ///
    /// The format is what `rsync --files-from` consumes. The file is written
    /// to a temporary sibling and renamed into place.
    pub fn write_list_file(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::InvalidPath(format!("{} has no parent", path.display())))?;
        fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        for entry in &self.entries {
            writeln!(tmp, "{entry}")?;
        }
        tmp.flush()?;
        tmp.persist(path)
            .map_err(|e| Error::IoError(format!("cannot write {}: {}", path.display(), e.error)))?;
        Ok(())
    }

    /// Read a list file written by [`PathManifest::write_list_file`]
    pub fn read_list_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut manifest = Self::new();
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            manifest.push(line)?;
        }
        Ok(manifest)
    }
}

impl<'a> FromIterator<&'a str> for PathManifest {
    /// Collect paths, skipping any that are not safe relative paths
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut manifest = Self::new();
        for path in iter {
            let _ = manifest.push(path);
        }
        manifest
    }
}

/// Canonical root-relative form of `path`, without a leading separator
///
/// Returns `None` for empty paths and paths with `..` segments.
pub fn canonical_relative(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}
