// src/sync/mod.rs

//! Mirror run driver
//!
//! Each source group goes through one pipeline, start to finish, on a single
//! worker:
//!
//! 1. build the index manifest from configuration
//! 2. pull the indexes into the staging tree
//! 3. build the package manifest from the staged indexes
//! 4. pull the packages into the published tree
//! 5. prune the staged metadata against the index manifest
//! 6. publish the staged metadata as a hard-linked snapshot
//! 7. prune the published tree against both manifests
//!
//! Cancellation is checked between phases. A cancelled group neither prunes
//! nor publishes (a group cancelled after publishing skips its final prune).
//! Errors are confined to the group that raised them; the run carries on with
//! the others and the summary reports every group.

mod report;

pub use report::{RunSummary, SourceOutcome, SourceReport};

use crate::cancel::CancelToken;
use crate::config::{MirrorSettings, MirrorSourceSet, SourceGroup};
use crate::error::{Error, Result};
use crate::layout::{METADATA_DIR, MirrorLayout, POOL_DIR};
use crate::lock::RunLock;
use crate::manifest::{IndexManifestBuilder, PackageManifestBuilder};
use crate::publish::SnapshotPublisher;
use crate::reconcile::Reconciler;
use crate::transfer::{BandwidthBudget, Transfer, TransferPhase, TransferPlanner, transfer_for_url};
use rayon::prelude::*;
use std::fs;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Mirrors a set of sources into the configured roots
pub struct Mirror {
    settings: MirrorSettings,
    layout: MirrorLayout,
    cancel: CancelToken,
    transfer: Option<Arc<dyn Transfer>>,
}

impl Mirror {
    pub fn new(settings: &MirrorSettings, cancel: CancelToken) -> Self {
        Self {
            settings: settings.clone(),
            layout: MirrorLayout::from_settings(settings),
            cancel,
            transfer: None,
        }
    }

    /// Use `transfer` for every source instead of choosing one by URL scheme
    pub fn with_transfer(mut self, transfer: Arc<dyn Transfer>) -> Self {
        self.transfer = Some(transfer);
        self
    }

    pub fn layout(&self) -> &MirrorLayout {
        &self.layout
    }

    /// Mirror every group in `sources`
    ///
    /// Only run-level setup (the run lock, the worker pool) fails the call;
    /// per-group failures are recorded in the summary.
    pub fn run(&self, sources: &MirrorSourceSet) -> Result<RunSummary> {
        let _lock = RunLock::acquire(self.layout.work_root())?;

        let groups = sources.groups();
        let workers = self.settings.jobs.min(groups.len()).max(1);
        let budget = BandwidthBudget::new(self.settings.bandwidth_limit_kbs, workers);

        info!(
            "Mirroring {} sources with {} workers at {} KB/s{}",
            groups.len(),
            workers,
            budget.limit_kbs(),
            if self.settings.dry_run { " (dry run)" } else { "" }
        );

        let reports: Vec<SourceReport> = if workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("debsync-worker-{i}"))
                .build()
                .map_err(|e| Error::IoError(format!("cannot start worker pool: {e}")))?;
            pool.install(|| {
                groups
                    .par_iter()
                    .map(|group| self.sync_group(group, &budget))
                    .collect()
            })
        } else {
            groups
                .iter()
                .map(|group| self.sync_group(group, &budget))
                .collect()
        };

        let interrupted = self.cancel.is_cancelled();
        if interrupted {
            warn!("Run was interrupted");
        }
        Ok(RunSummary {
            sources: reports,
            interrupted,
        })
    }

    /// Run one group's pipeline and record how it ended
    pub fn sync_group(&self, group: &SourceGroup, budget: &BandwidthBudget) -> SourceReport {
        let mut report = SourceReport::new(group.key(), group.url().as_str());

        match self.run_pipeline(group, budget, &mut report) {
            Ok(()) => info!("Finished {}", group.url()),
            Err(e) if e.is_cancelled() => {
                warn!("Abandoned {}: run interrupted", group.url());
                report.outcome = SourceOutcome::Cancelled;
            }
            Err(e) => {
                error!("Mirroring {} failed: {}", group.url(), e);
                report.outcome = SourceOutcome::Failed(e.to_string());
            }
        }
        report
    }

    fn run_pipeline(
        &self,
        group: &SourceGroup,
        budget: &BandwidthBudget,
        report: &mut SourceReport,
    ) -> Result<()> {
        self.cancel.check()?;

        let url = group.url();
        let paths = self.layout.paths_for(group);
        let transfer = match &self.transfer {
            Some(transfer) => Arc::clone(transfer),
            None => transfer_for_url(url, &self.settings, budget)?,
        };
        let planner = TransferPlanner::new(transfer, *budget);
        let reconciler = Reconciler::dry_run(self.settings.dry_run);
        let publisher = SnapshotPublisher::dry_run(self.settings.dry_run);

        let index_manifest = IndexManifestBuilder::build_all(group.sources());
        let indexes = planner.pull(
            TransferPhase::Indexes,
            &index_manifest,
            url,
            &paths.work_dir,
            &paths.index_list,
            &self.cancel,
        )?;
        report.indexes_fetched = indexes.fetched;
        report.missing += indexes.missing.len();

        self.cancel.check()?;
        let packages = PackageManifestBuilder::build(&paths.work_dir, &index_manifest);
        report.packages_listed = packages.manifest.len();
        report.warnings.extend(packages.warnings.iter().cloned());

        let fetched = planner.pull(
            TransferPhase::Packages,
            &packages.manifest,
            url,
            &paths.published_dir,
            &paths.package_list,
            &self.cancel,
        )?;
        report.packages_fetched = fetched.fetched;
        report.missing += fetched.missing.len();

        self.cancel.check()?;
        let staged = reconciler.prune_within(&paths.work_dir, METADATA_DIR, &index_manifest)?;
        report.pruned_staging = staged.removed.len();

        self.cancel.check()?;
        // Publish an empty tree rather than nothing when no index arrived
        fs::create_dir_all(paths.staged_metadata())?;
        publisher.publish(&paths.staged_metadata(), &paths.published_metadata())?;

        self.cancel.check()?;
        let wanted = index_manifest.union(&packages.manifest);
        let published = reconciler.prune(&paths.published_dir, &wanted)?;
        report.pruned_published = published.removed.len();

        if self.settings.prune_empty_dirs {
            reconciler.prune_empty_dirs(&paths.work_dir, METADATA_DIR)?;
            reconciler.prune_empty_dirs(&paths.published_dir, POOL_DIR)?;
        }

        Ok(())
    }
}
