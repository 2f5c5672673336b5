// src/transfer/http.rs

//! HTTP(S) transport
//!
//! Fetches each listed path relative to the source URL. Files already present
//! locally are revalidated with `If-Modified-Since` and skipped on
//! `304 Not Modified`; fresh bodies are streamed through this worker's share
//! of the bandwidth budget into a temporary file that is renamed into place, and the file's
//! mtime is set from `Last-Modified` so the next run can revalidate it.

use super::{Transfer, TransferOutcome, TransferRequest, WorkerThrottle};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Buffer size for streaming downloads (64 KB)
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Transfer backend built on a blocking `reqwest` client
pub struct HttpTransfer {
    client: Client,
    throttle: WorkerThrottle,
}

impl HttpTransfer {
    pub fn new(throttle: WorkerThrottle, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("debsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::TransferError(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, throttle })
    }

    fn url_for(base: &url::Url, relative: &str) -> String {
        format!("{}/{}", base.as_str().trim_end_matches('/'), relative)
    }

    /// Fetch one path; `Ok(None)` means the remote does not have it
    fn fetch_one(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancelToken,
    ) -> Result<Option<FetchResult>> {
        let mut request = self.client.get(url);
        if let Some(since) = local_mtime(dest) {
            request = request.header(IF_MODIFIED_SINCE, http_date(since));
        }

        let response = match request.send() {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                return Err(Error::TransferError(format!("cannot reach {url}: {e}")));
            }
            Err(e) => {
                warn!("Request for {} failed: {}", url, e);
                return Ok(None);
            }
        };

        match response.status() {
            StatusCode::NOT_MODIFIED => Ok(Some(FetchResult::Unchanged)),
            status if status.is_success() => {
                self.stream_to_file(response, dest, cancel)?;
                Ok(Some(FetchResult::Fetched))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                warn!("HTTP {} from {}", status, url);
                Ok(None)
            }
        }
    }

    /// Stream `response` to `dest` at this worker's rate
    fn stream_to_file(&self, mut response: Response, dest: &Path, cancel: &CancelToken) -> Result<()> {
        let parent = dest
            .parent()
            .ok_or_else(|| Error::InvalidPath(format!("{} has no parent", dest.display())))?;
        fs::create_dir_all(parent)?;

        let modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| FileTime::from_unix_time(dt.timestamp(), 0));

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];
        loop {
            cancel.check()?;
            let chunk = self.throttle.recommended_chunk(buffer.len());
            let read = response
                .read(&mut buffer[..chunk])
                .map_err(|e| Error::TransferError(format!("failed to read response: {e}")))?;
            if read == 0 {
                break;
            }
            tmp.write_all(&buffer[..read])?;
            self.throttle.throttle(read);
        }
        tmp.flush()?;

        tmp.persist(dest)
            .map_err(|e| Error::IoError(format!("cannot write {}: {}", dest.display(), e.error)))?;

        if let Some(mtime) = modified {
            filetime::set_file_mtime(dest, mtime)?;
        }
        Ok(())
    }
}

enum FetchResult {
    Fetched,
    Unchanged,
}

impl Transfer for HttpTransfer {
    fn name(&self) -> &'static str {
        "http"
    }

    fn fetch(&self, request: &TransferRequest<'_>, cancel: &CancelToken) -> Result<TransferOutcome> {
        let mut outcome = TransferOutcome::default();

        for relative in request.manifest.relative_paths() {
            cancel.check()?;
            let url = Self::url_for(request.source_root, relative);
            let dest = request.dest_root.join(relative);

            match self.fetch_one(&url, &dest, cancel)? {
                Some(FetchResult::Fetched) => {
                    debug!("Fetched {}", url);
                    outcome.fetched += 1;
                }
                Some(FetchResult::Unchanged) => outcome.unchanged += 1,
                None => outcome.missing.push(format!("/{relative}")),
            }
        }

        Ok(outcome)
    }
}

fn local_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok().filter(|m| m.is_file())?.modified().ok()
}

/// IMF-fixdate as used in HTTP headers
fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
