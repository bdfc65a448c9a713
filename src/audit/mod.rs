//! Scan orchestration: pull entries from a metadata source, apply the size and
//! age gates, classify, and rank.

mod parallel;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crate::config::{AuditConfig, ScanMode};
use crate::error::{AuditError, Result};
use crate::ranking::{MatchRecord, RankStrategy, RankedReport, TopN};
use crate::rules::RuleSet;
use crate::source::{EntryResult, FileEntry, MetadataSource};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Thresholds and ranking parameters for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPolicy {
    /// Minimum time since last modification
    pub min_age: Duration,
    /// Minimum size in bytes
    pub size_threshold: u64,
    /// Entries in the final report
    pub top_n: usize,
    /// Extra records the ranker may hold between compactions
    pub slack: usize,
    pub mode: ScanMode,
}

impl ScanPolicy {
    pub fn from_config(config: &AuditConfig) -> Self {
        Self {
            min_age: Duration::from_secs(u64::from(config.min_age_days) * SECS_PER_DAY),
            size_threshold: config.size_threshold_bytes(),
            top_n: config.top_n,
            slack: config.slack,
            mode: config.mode,
        }
    }

    /// Legacy scans rank every match and apply the size cutoff at the end.
    pub fn strategy(&self) -> RankStrategy {
        match self.mode {
            ScanMode::Streaming => RankStrategy::Slack { slack: self.slack },
            ScanMode::Legacy => RankStrategy::Unbounded,
        }
    }
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self::from_config(&AuditConfig::default())
    }
}

/// Lifecycle of an [`Auditor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Enumerating,
    Finalizing,
    Done,
    /// The enumeration backend could not be started
    Failed,
}

/// Result of a completed scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Entries that passed the gates applied before classification
    pub eligible: u64,
    /// Entries produced by the source
    pub examined: u64,
    /// Records the source could not turn into entries
    pub skipped: u64,
    pub report: RankedReport,
    pub elapsed: Duration,
}

impl ScanOutcome {
    /// Eligible entries per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.eligible as f64 / secs
        } else {
            0.0
        }
    }
}

/// Live counters, readable from another thread while a scan runs.
#[derive(Debug, Default)]
pub struct ScanProgress {
    examined: AtomicU64,
    eligible: AtomicU64,
    matched: AtomicU64,
}

impl ScanProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn examined(&self) -> u64 {
        self.examined.load(Ordering::Relaxed)
    }

    pub fn eligible(&self) -> u64 {
        self.eligible.load(Ordering::Relaxed)
    }

    pub fn matched(&self) -> u64 {
        self.matched.load(Ordering::Relaxed)
    }
}

/// Cheap rejections and classification for a single entry.
struct Gate<'a> {
    policy: &'a ScanPolicy,
    rules: &'a RuleSet,
    now: SystemTime,
}

impl Gate<'_> {
    fn admit(&self, entry: &FileEntry) -> bool {
        if self.policy.mode == ScanMode::Streaming && entry.size_bytes < self.policy.size_threshold
        {
            return false;
        }
        entry
            .age_at(self.now)
            .is_some_and(|age| age >= self.policy.min_age)
    }

    fn classify(&self, entry: FileEntry) -> Option<MatchRecord> {
        let rule = self.rules.classify_path(&entry.path)?;
        Some(MatchRecord {
            reason: rule.reason().to_string(),
            path: entry.path,
            size_bytes: entry.size_bytes,
        })
    }
}

/// Counters and ranker for one stream of entries.
struct Tally {
    ranker: TopN,
    examined: u64,
    eligible: u64,
    skipped: u64,
}

impl Tally {
    fn new(policy: &ScanPolicy) -> Self {
        Self {
            ranker: TopN::new(policy.top_n, policy.strategy()),
            examined: 0,
            eligible: 0,
            skipped: 0,
        }
    }

    fn consume(&mut self, item: EntryResult, gate: &Gate<'_>, progress: Option<&ScanProgress>) {
        let entry = match item {
            Ok(entry) => entry,
            Err(skip) => {
                self.skipped += 1;
                tracing::trace!(?skip, "Skipped entry");
                return;
            }
        };

        self.examined += 1;
        if let Some(p) = progress {
            p.examined.fetch_add(1, Ordering::Relaxed);
        }
        if !gate.admit(&entry) {
            return;
        }

        self.eligible += 1;
        if let Some(p) = progress {
            p.eligible.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(record) = gate.classify(entry) {
            tracing::trace!(path = %record.path.display(), reason = %record.reason, "Flagged");
            self.ranker.offer(record);
            if let Some(p) = progress {
                p.matched.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn absorb(&mut self, other: Tally) {
        self.examined += other.examined;
        self.eligible += other.eligible;
        self.skipped += other.skipped;
        self.ranker.merge(other.ranker);
    }
}

/// Drives one scan from a metadata source to a ranked report.
///
/// Ages are measured against a reference time fixed when the auditor is
/// built (see [`Auditor::with_now`]).
pub struct Auditor {
    source: Box<dyn MetadataSource>,
    rules: RuleSet,
    policy: ScanPolicy,
    now: SystemTime,
    state: ScanState,
    progress: Option<Arc<ScanProgress>>,
}

impl Auditor {
    pub fn new(source: Box<dyn MetadataSource>, rules: RuleSet, policy: ScanPolicy) -> Self {
        Self {
            source,
            rules,
            policy,
            now: SystemTime::now(),
            state: ScanState::Idle,
            progress: None,
        }
    }

    /// Override the reference time used for the age gate.
    pub fn with_now(mut self, now: SystemTime) -> Self {
        self.now = now;
        self
    }

    /// Publish live counters into `progress`.
    pub fn with_progress(mut self, progress: Arc<ScanProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn policy(&self) -> &ScanPolicy {
        &self.policy
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Return to `Idle` so another scan can run.
    pub fn reset(&mut self) {
        self.transition(ScanState::Idle);
    }

    /// Scan `root` and rank the flagged files.
    ///
    /// Fails without a report if the backend cannot be started. Problems with
    /// individual entries are counted in [`ScanOutcome::skipped`].
    pub fn scan(&mut self, root: &Path) -> Result<ScanOutcome> {
        let root = self.begin(root)?;
        let started = Instant::now();

        let entries = match self.source.entries(&root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(backend = self.source.name(), error = %e, "Scan failed");
                self.transition(ScanState::Failed);
                return Err(e);
            }
        };

        let gate = Gate {
            policy: &self.policy,
            rules: &self.rules,
            now: self.now,
        };
        let mut tally = Tally::new(&self.policy);
        for item in entries {
            tally.consume(item, &gate, self.progress.as_deref());
        }

        Ok(self.finish(tally, started))
    }

    fn begin(&mut self, root: &Path) -> Result<std::path::PathBuf> {
        if self.state != ScanState::Idle {
            return Err(AuditError::InvalidState(self.state));
        }
        let root = root
            .canonicalize()
            .map_err(|_| AuditError::PathNotFound(root.to_path_buf()))?;

        tracing::info!(
            root = %root.display(),
            backend = self.source.name(),
            mode = ?self.policy.mode,
            "Starting scan"
        );
        self.transition(ScanState::Enumerating);
        Ok(root)
    }

    fn finish(&mut self, tally: Tally, started: Instant) -> ScanOutcome {
        self.transition(ScanState::Finalizing);
        tracing::debug!(
            retained = tally.ranker.len(),
            high_water_mark = tally.ranker.high_water_mark(),
            offered = tally.ranker.offered(),
            "Finalizing ranking"
        );

        let report = match self.policy.mode {
            ScanMode::Streaming => tally.ranker.finalize(),
            ScanMode::Legacy => {
                let threshold = self.policy.size_threshold;
                tally
                    .ranker
                    .finalize_where(self.policy.top_n, |r| r.size_bytes >= threshold)
            }
        };

        let outcome = ScanOutcome {
            eligible: tally.eligible,
            examined: tally.examined,
            skipped: tally.skipped,
            report,
            elapsed: started.elapsed(),
        };
        self.transition(ScanState::Done);

        tracing::info!(
            examined = outcome.examined,
            eligible = outcome.eligible,
            skipped = outcome.skipped,
            reported = outcome.report.len(),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Scan complete"
        );
        outcome
    }

    fn transition(&mut self, next: ScanState) {
        tracing::debug!(from = ?self.state, to = ?next, "Scan state");
        self.state = next;
    }
}
