// src/sync/report.rs

//! Per-source results and the run summary

use std::fmt;

/// How a source's pipeline ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Completed,
    Failed(String),
    /// Abandoned before publish and prune
    Cancelled,
}

/// Counts gathered while mirroring one source group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub key: String,
    pub url: String,
    pub indexes_fetched: usize,
    pub packages_listed: usize,
    pub packages_fetched: usize,
    /// Manifest paths the remote did not provide
    pub missing: usize,
    pub pruned_staging: usize,
    pub pruned_published: usize,
    pub warnings: Vec<String>,
    pub outcome: SourceOutcome,
}

impl SourceReport {
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            indexes_fetched: 0,
            packages_listed: 0,
            packages_fetched: 0,
            missing: 0,
            pruned_staging: 0,
            pruned_published: 0,
            warnings: Vec::new(),
            outcome: SourceOutcome::Completed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == SourceOutcome::Cancelled
    }
}

impl fmt::Display for SourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match &self.outcome {
            SourceOutcome::Completed => "[OK]",
            SourceOutcome::Failed(_) => "[FAILED]",
            SourceOutcome::Cancelled => "[CANCELLED]",
        };
        write!(
            f,
            "  {} {} ({}): {} indexes, {} of {} packages fetched, {} missing, pruned {} staged / {} published",
            tag,
            self.key,
            self.url,
            self.indexes_fetched,
            self.packages_fetched,
            self.packages_listed,
            self.missing,
            self.pruned_staging,
            self.pruned_published
        )?;
        if let SourceOutcome::Failed(reason) = &self.outcome {
            write!(f, "\n      error: {reason}")?;
        }
        for warning in &self.warnings {
            write!(f, "\n      warning: {warning}")?;
        }
        Ok(())
    }
}

/// Results of every source in a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub sources: Vec<SourceReport>,
    /// The run's cancel token was tripped, even if every group had finished
    pub interrupted: bool,
}

impl RunSummary {
    /// Process exit status: 130 if interrupted, 1 if any source failed, else 0
    pub fn exit_code(&self) -> u8 {
        if self.interrupted || self.sources.iter().any(SourceReport::is_cancelled) {
            130
        } else if self.sources.iter().any(SourceReport::is_failed) {
            1
        } else {
            0
        }
    }

    pub fn failed(&self) -> usize {
        self.sources.iter().filter(|s| s.is_failed()).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mirrored {} sources:", self.sources.len())?;
        for source in &self.sources {
            writeln!(f, "{source}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: SourceOutcome) -> SourceReport {
        let mut r = SourceReport::new("mirror.example", "rsync://mirror.example/ubuntu");
        r.outcome = outcome;
        r
    }

    #[test]
    fn test_exit_codes() {
        let ok = RunSummary {
            sources: vec![report(SourceOutcome::Completed)],
            ..Default::default()
        };
        assert_eq!(ok.exit_code(), 0);

        let failed = RunSummary {
            sources: vec![
                report(SourceOutcome::Completed),
                report(SourceOutcome::Failed("boom".into())),
            ],
            ..Default::default()
        };
        assert_eq!(failed.exit_code(), 1);
        assert_eq!(failed.failed(), 1);

        let cancelled = RunSummary {
            sources: vec![
                report(SourceOutcome::Failed("boom".into())),
                report(SourceOutcome::Cancelled),
            ],
            ..Default::default()
        };
        assert_eq!(cancelled.exit_code(), 130);
    }

    #[test]
    fn test_interrupt_after_last_group_still_exits_130() {
        let summary = RunSummary {
            sources: vec![report(SourceOutcome::Completed)],
            interrupted: true,
        };
        assert_eq!(summary.exit_code(), 130);
    }

    #[test]
    fn test_display_includes_failure_and_warnings() {
        let mut r = report(SourceOutcome::Failed("rsync exited with code 5".into()));
        r.warnings.push("no usable package index".into());
        let text = r.to_string();
        assert!(text.starts_with("  [FAILED] mirror.example"));
        assert!(text.contains("error: rsync exited with code 5"));
        assert!(text.contains("warning: no usable package index"));
    }
}
