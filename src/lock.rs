// src/lock.rs

//! Exclusive run lock on the work root
//!
//! Staging trees are exclusive to one worker, which only holds if a single
//! run uses a work root at a time.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = ".debsync.lock";

/// Held for the duration of a run; released on drop
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock without blocking
    pub fn acquire(work_root: &Path) -> Result<Self> {
        fs::create_dir_all(work_root)?;
        let path = work_root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        file.try_lock_exclusive().map_err(|_| {
            Error::LockError(format!(
                "another run holds {}; refusing to share staging trees",
                path.display()
            ))
        })?;

        debug!("Acquired run lock {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
