// src/transfer/planner.rs

//! Transfer planning
//!
//! The planner owns the bookkeeping around a pull: it creates the destination,
//! persists the manifest as a list file, forwards the request to the backend
//! and logs per-path misses. Misses are not errors; the reconciler never
//! deletes a manifest path, so a missing file simply stays missing.

use super::{BandwidthBudget, Transfer, TransferOutcome, TransferRequest};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::manifest::PathManifest;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Which manifest a pull carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Indexes,
    Packages,
}

impl std::fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferPhase::Indexes => write!(f, "indexes"),
            TransferPhase::Packages => write!(f, "packages"),
        }
    }
}

/// Issues rate-limited pulls through a [`Transfer`] backend
#[derive(Clone)]
pub struct TransferPlanner {
    transfer: Arc<dyn Transfer>,
    budget: BandwidthBudget,
}

impl TransferPlanner {
    pub fn new(transfer: Arc<dyn Transfer>, budget: BandwidthBudget) -> Self {
        Self { transfer, budget }
    }

    /// Pull exactly the paths of `manifest` from `source_root` into `dest_root`
    pub fn pull(
        &self,
        phase: TransferPhase,
        manifest: &PathManifest,
        source_root: &Url,
        dest_root: &Path,
        list_file: &Path,
        cancel: &CancelToken,
    ) -> Result<TransferOutcome> {
        cancel.check()?;

        fs::create_dir_all(dest_root)?;
        manifest.write_list_file(list_file)?;

        if manifest.is_empty() {
            debug!("Nothing to pull for {} {}", source_root, phase);
            return Ok(TransferOutcome::default());
        }

        let request = TransferRequest {
            manifest,
            source_root,
            dest_root,
            list_file,
            bandwidth_limit_kbs: self.budget.per_worker_kbs(),
        };

        info!(
            "Pulling {} {} from {} via {} into {}",
            manifest.len(),
            phase,
            source_root,
            self.transfer.name(),
            dest_root.display()
        );

        let outcome = self.transfer.fetch(&request, cancel)?;

        for path in &outcome.missing {
            warn!("{} {}: not available from {}", phase, path, source_root);
        }
        info!(
            "Pulled {} {}: {} fetched, {} unchanged, {} missing",
            source_root,
            phase,
            outcome.fetched,
            outcome.unchanged,
            outcome.missing.len()
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransfer {
        seen: Mutex<Vec<(Vec<String>, u32)>>,
    }

    impl Transfer for RecordingTransfer {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn fetch(
            &self,
            request: &TransferRequest<'_>,
            _cancel: &CancelToken,
        ) -> Result<TransferOutcome> {
            let paths = request.manifest.iter().map(str::to_string).collect();
            self.seen
                .lock()
                .unwrap()
                .push((paths, request.bandwidth_limit_kbs));
            Ok(TransferOutcome {
                fetched: request.manifest.len() - 1,
                unchanged: 0,
                missing: vec!["/dists/x/Release.gpg".to_string()],
            })
        }
    }

    #[test]
    fn test_pull_writes_list_and_forwards_request() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = Arc::new(RecordingTransfer::default());
        let planner = TransferPlanner::new(transfer.clone(), BandwidthBudget::new(1000, 2));

        let manifest: PathManifest = ["/dists/x/Release", "/dists/x/Release.gpg"]
            .into_iter()
            .collect();
        let dest = tmp.path().join("host");
        let list = dest.join("indexes");
        let url = Url::parse("rsync://host/ubuntu").unwrap();

        let outcome = planner
            .pull(TransferPhase::Indexes, &manifest, &url, &dest, &list, &CancelToken::new())
            .unwrap();

        assert_eq!(outcome.fetched, 1);
        assert_eq!(outcome.missing.len(), 1);
        assert!(dest.is_dir());
        assert_eq!(
            fs::read_to_string(&list).unwrap(),
            "/dists/x/Release\n/dists/x/Release.gpg\n"
        );
        let seen = transfer.seen.lock().unwrap();
        assert_eq!(seen[0].0.len(), 2);
        assert_eq!(seen[0].1, 500);
    }

    #[test]
    fn test_pull_refuses_after_cancel() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = Arc::new(RecordingTransfer::default());
        let planner = TransferPlanner::new(transfer.clone(), BandwidthBudget::new(1000, 1));
        let cancel = CancelToken::new();
        cancel.cancel();

        let manifest: PathManifest = ["/a"].into_iter().collect();
        let url = Url::parse("rsync://host/").unwrap();
        let result = planner.pull(
            TransferPhase::Packages,
            &manifest,
            &url,
            tmp.path(),
            &tmp.path().join("packages"),
            &cancel,
        );
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(transfer.seen.lock().unwrap().is_empty());
    }
}
