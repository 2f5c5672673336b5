// src/transfer/mod.rs

//! Rate-limited file transfer
//!
//! The reconciliation core never talks to the network directly. It hands a
//! [`TransferRequest`] to a [`Transfer`] implementation, which fetches exactly
//! the listed paths:
//!
//! - [`RsyncTransfer`]: drives the `rsync` tool with `--files-from`
//! - [`HttpTransfer`]: fetches each path over HTTP(S) with `reqwest`
//!
//! Individual missing paths are reported in the [`TransferOutcome`]; only
//! batch-level failures (tool missing, protocol error, unreachable host)
//! come back as errors.

mod bandwidth;
mod http;
mod planner;
mod rsync;

pub use bandwidth::{BandwidthBudget, BandwidthLimiter, WorkerThrottle};
pub use http::HttpTransfer;
pub use planner::{TransferPhase, TransferPlanner};
pub use rsync::RsyncTransfer;

use crate::cancel::CancelToken;
use crate::config::MirrorSettings;
use crate::error::{Error, Result};
use crate::manifest::PathManifest;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// One batch of paths to pull from a source
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub manifest: &'a PathManifest,
    pub source_root: &'a Url,
    pub dest_root: &'a Path,
    /// List file holding `manifest`, one `/path` per line
    pub list_file: &'a Path,
    pub bandwidth_limit_kbs: u32,
}

/// Result of a batch that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Paths written or updated
    pub fetched: usize,
    /// Paths already up to date
    pub unchanged: usize,
    /// Paths the remote did not provide
    pub missing: Vec<String>,
}

/// A backend able to fetch a list of paths into a directory
pub trait Transfer: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Fetch every path in `request`, preserving relative structure
    ///
    /// Implementations must return `Err(Error::Cancelled)` promptly once
    /// `cancel` is tripped.
    fn fetch(&self, request: &TransferRequest<'_>, cancel: &CancelToken) -> Result<TransferOutcome>;
}

/// Transport families selected by URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Rsync,
    Http,
}

impl TransportKind {
    pub fn for_url(url: &Url) -> Result<Self> {
        match url.scheme() {
            "rsync" => Ok(Self::Rsync),
            "http" | "https" => Ok(Self::Http),
            other => Err(Error::ConfigError(format!(
                "unsupported URL scheme '{other}' in {url}"
            ))),
        }
    }
}

/// Build the transport for `url`
pub fn transfer_for_url(
    url: &Url,
    settings: &MirrorSettings,
    budget: &BandwidthBudget,
) -> Result<Arc<dyn Transfer>> {
    Ok(match TransportKind::for_url(url)? {
        TransportKind::Rsync => Arc::new(RsyncTransfer::new()?),
        TransportKind::Http => Arc::new(HttpTransfer::new(
            budget.worker_throttle(),
            Duration::from_secs(settings.http_timeout_secs),
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_by_scheme() {
        let rsync = Url::parse("rsync://m.example/ubuntu").unwrap();
        let https = Url::parse("https://m.example/ubuntu").unwrap();
        let ftp = Url::parse("ftp://m.example/ubuntu").unwrap();
        assert_eq!(TransportKind::for_url(&rsync).unwrap(), TransportKind::Rsync);
        assert_eq!(TransportKind::for_url(&https).unwrap(), TransportKind::Http);
        assert!(TransportKind::for_url(&ftp).is_err());
    }
}
