// src/manifest/packages.rs

//! Package manifest construction
//!
//! Reads the `Packages` indexes fetched into a staging root, decompresses
//! them, and collects every `Filename:` value as a root-relative path.
//!
//! Only index files named by the index manifest are considered, so stale
//! indexes from components that are no longer configured never contribute.
//! For each `binary-<arch>` directory the compressed variants are tried in
//! manifest order and the first one that decodes is used. A corrupt or
//! missing variant is logged and the next one is tried; a directory with no
//! usable variant is skipped with a warning.

use super::PathManifest;
use super::scanner::field_values;
use crate::compression::decompress_text;
use crate::error::{Error, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of scanning the staged indexes for one source
#[derive(Debug, Clone, Default)]
pub struct PackageManifest {
    /// Package paths, in discovery order
    pub manifest: PathManifest,
    /// Index files that were parsed successfully
    pub indexes_read: usize,
    /// Human-readable warnings about skipped index files
    pub warnings: Vec<String>,
}

/// Builds the package manifest from staged index files
pub struct PackageManifestBuilder;

impl PackageManifestBuilder {
    /// Scan `index_root` for the `Packages` files named in `index_manifest`
    pub fn build(index_root: &Path, index_manifest: &PathManifest) -> PackageManifest {
        let mut result = PackageManifest::default();

        for candidates in package_index_groups(index_manifest) {
            let dir = candidates[0].rsplit_once('/').map_or("", |(d, _)| d);
            let mut used = false;

            for relative in &candidates {
                let path = index_root.join(relative);
                if !path.is_file() {
                    debug!("Index {} not present, trying next format", relative);
                    continue;
                }

                match Self::read_index(&path, relative) {
                    Ok(paths) => {
                        let before = result.manifest.len();
                        for package in paths {
                            if let Err(e) = result.manifest.push(&package) {
                                let msg = format!("{relative}: skipping package entry: {e}");
                                warn!("{}", msg);
                                result.warnings.push(msg);
                            }
                        }
                        debug!(
                            "Read {} ({} new package paths)",
                            relative,
                            result.manifest.len() - before
                        );
                        result.indexes_read += 1;
                        used = true;
                        break;
                    }
                    Err(e) => {
                        let msg = format!("{relative}: {e}");
                        warn!("Skipping unreadable index {}", msg);
                        result.warnings.push(msg);
                    }
                }
            }

            if !used {
                let msg = format!("{dir}: no usable Packages index");
                warn!("{}", msg);
                result.warnings.push(msg);
            }
        }

        if result.manifest.is_empty() {
            let msg = "package manifest is empty; the pool will be pruned to empty".to_string();
            warn!("{}", msg);
            result.warnings.push(msg);
        } else {
            info!(
                "Package manifest: {} paths from {} indexes",
                result.manifest.len(),
                result.indexes_read
            );
        }

        result
    }

    /// Extract package paths from one index file
    fn read_index(path: &Path, name: &str) -> Result<Vec<String>> {
        let data = std::fs::read(path)?;
        let text =
            decompress_text(&data, name).map_err(|e| Error::ParseError(e.to_string()))?;
        Ok(Self::extract(&text))
    }

    /// Every `Filename:` value in `text`, as a root-relative path
    pub fn extract(text: &str) -> Vec<String> {
        field_values(text, "Filename")
            .into_iter()
            .map(|value| format!("/{}", value.trim_start_matches('/')))
            .collect()
    }
}

/// `Packages*` entries of the manifest grouped by directory, in manifest order
fn package_index_groups(index_manifest: &PathManifest) -> Vec<Vec<String>> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for relative in index_manifest.relative_paths() {
        let (dir, file) = relative.rsplit_once('/').unwrap_or(("", relative));
        if file != "Packages" && !file.starts_with("Packages.") {
            continue;
        }
        match groups.iter_mut().find(|(d, _)| d == dir) {
            Some((_, files)) => files.push(relative.to_string()),
            None => groups.push((dir.to_string(), vec![relative.to_string()])),
        }
    }
    groups.into_iter().map(|(_, files)| files).collect()
}
