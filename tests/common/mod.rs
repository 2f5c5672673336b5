// tests/common/mod.rs

//! Shared test utilities for integration tests

#![allow(dead_code)]

use debsync::config::{MirrorSettings, MirrorSourceSet, parse_sources};
use debsync::transfer::{Transfer, TransferOutcome, TransferRequest};
use debsync::{CancelToken, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Scratch directories for one test: a fake remote plus work and mirror roots
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn remote(&self) -> PathBuf {
        self.dir.path().join("remote")
    }

    pub fn work_root(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn mirror_root(&self) -> PathBuf {
        self.dir.path().join("mirror")
    }

    pub fn settings(&self) -> MirrorSettings {
        MirrorSettings {
            mirror_root: self.mirror_root(),
            work_root: self.work_root(),
            ..Default::default()
        }
    }

    /// Write a file under the fake remote
    pub fn remote_file(&self, relative: &str, data: &[u8]) {
        write_file(&self.remote().join(relative), data);
    }

    /// Write a gzip `Packages` index under the fake remote
    pub fn remote_packages(&self, dist: &str, component: &str, filenames: &[&str]) {
        let relative = format!("dists/{dist}/{component}/binary-amd64/Packages.gz");
        self.remote_file(&relative, &gzip(&packages_index(filenames)));
    }

    /// Write a file directly into a published tree
    pub fn published_file(&self, key: &str, relative: &str, data: &[u8]) {
        write_file(&self.mirror_root().join(key).join(relative), data);
    }

    pub fn published(&self, key: &str, relative: &str) -> PathBuf {
        self.mirror_root().join(key).join(relative)
    }

    pub fn staged(&self, key: &str, relative: &str) -> PathBuf {
        self.work_root().join(key).join(relative)
    }
}

pub fn write_file(path: &Path, data: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

/// A `Packages` index with one stanza per filename
pub fn packages_index(filenames: &[&str]) -> String {
    let mut out = String::new();
    for (i, filename) in filenames.iter().enumerate() {
        out.push_str(&format!(
            "Package: pkg{i}\nVersion: 1.0\nArchitecture: amd64\nFilename: {filename}\nSize: 1024\nDescription: test package\n that spans lines\n\n"
        ));
    }
    out
}

pub fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

pub fn resolve(content: &str) -> MirrorSourceSet {
    let sources = parse_sources(content, &["amd64".to_string()]).unwrap();
    MirrorSourceSet::resolve(sources).unwrap()
}

/// Transfer that copies from a local directory standing in for the remote
///
/// Files are written to a temporary sibling and renamed into place, the way
/// rsync and the HTTP transport replace files.
pub struct LocalTransfer {
    remote: PathBuf,
    /// Trip this token when a pool path is requested
    cancel_on_pool: Option<CancelToken>,
    pub requests: Mutex<Vec<Vec<String>>>,
}

impl LocalTransfer {
    pub fn new(remote: impl Into<PathBuf>) -> Self {
        Self {
            remote: remote.into(),
            cancel_on_pool: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn cancelling_on_pool(mut self, token: CancelToken) -> Self {
        self.cancel_on_pool = Some(token);
        self
    }
}

impl Transfer for LocalTransfer {
    fn name(&self) -> &'static str {
        "local"
    }

    fn fetch(&self, request: &TransferRequest<'_>, cancel: &CancelToken) -> Result<TransferOutcome> {
        self.requests
            .lock()
            .unwrap()
            .push(request.manifest.iter().map(str::to_string).collect());

        let mut outcome = TransferOutcome::default();
        for relative in request.manifest.relative_paths() {
            if relative.starts_with("pool/") {
                if let Some(token) = &self.cancel_on_pool {
                    token.cancel();
                }
            }
            cancel.check()?;

            let source = self.remote.join(relative);
            if !source.is_file() {
                outcome.missing.push(format!("/{relative}"));
                continue;
            }

            let dest = request.dest_root.join(relative);
            fs::create_dir_all(dest.parent().unwrap())?;
            let tmp = dest.with_extension("partial");
            fs::copy(&source, &tmp)?;
            fs::rename(&tmp, &dest)?;
            outcome.fetched += 1;
        }
        Ok(outcome)
    }
}
