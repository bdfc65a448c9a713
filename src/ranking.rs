//! Bounded top-N ranking of classified matches.

use serde::Serialize;
use std::path::PathBuf;

/// A file that passed the audit gates and matched a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub reason: String,
}

/// How matches are retained until finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankStrategy {
    /// Keep at most `limit + slack` records, compacting in batches.
    Slack { slack: usize },
    /// Keep every record until the end.
    Unbounded,
}

/// Final ordered report: largest first, ties in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RankedReport {
    entries: Vec<MatchRecord>,
}

impl RankedReport {
    pub fn entries(&self) -> &[MatchRecord] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }
}

impl<'a> IntoIterator for &'a RankedReport {
    type Item = &'a MatchRecord;
    type IntoIter = std::slice::Iter<'a, MatchRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Accumulates matches and yields the `limit` largest.
///
/// With [`RankStrategy::Slack`] the working buffer never holds more than
/// `limit + slack` records: when it is full it is sorted and cut down to
/// `limit + slack - 1` before the next record goes in. Sorting is stable, so
/// records of equal size keep the order in which they were offered and the
/// result is identical to the unbounded strategy.
#[derive(Debug, Clone)]
pub struct TopN {
    limit: usize,
    strategy: RankStrategy,
    buffer: Vec<MatchRecord>,
    high_water_mark: usize,
    offered: u64,
}

impl TopN {
    /// A slack of zero is raised to one: compaction keeps `limit + slack - 1`
    /// records, which must never drop below `limit`.
    pub fn new(limit: usize, strategy: RankStrategy) -> Self {
        let strategy = match strategy {
            RankStrategy::Slack { slack } => RankStrategy::Slack { slack: slack.max(1) },
            unbounded => unbounded,
        };
        let capacity = match strategy {
            RankStrategy::Slack { slack } => limit.saturating_add(slack),
            RankStrategy::Unbounded => limit,
        };
        Self {
            limit,
            strategy,
            buffer: Vec::with_capacity(capacity),
            high_water_mark: 0,
            offered: 0,
        }
    }

    /// Slack ranker with the given extra capacity.
    pub fn with_slack(limit: usize, slack: usize) -> Self {
        Self::new(limit, RankStrategy::Slack { slack })
    }

    /// Accept a record into the working set.
    pub fn offer(&mut self, record: MatchRecord) {
        if let RankStrategy::Slack { slack } = self.strategy {
            let cap = self.limit.saturating_add(slack);
            if self.buffer.len() >= cap {
                self.compact(cap - 1);
            }
        }

        self.buffer.push(record);
        self.offered += 1;
        self.high_water_mark = self.high_water_mark.max(self.buffer.len());
    }

    /// Sort and keep the `limit` largest records.
    pub fn finalize(self) -> RankedReport {
        let limit = self.limit;
        self.finalize_where(limit, |_| true)
    }

    /// Sort, drop records failing `keep`, and keep the `limit` largest of the rest.
    pub fn finalize_where<F>(mut self, limit: usize, keep: F) -> RankedReport
    where
        F: Fn(&MatchRecord) -> bool,
    {
        self.buffer.retain(|r| keep(r));
        self.compact(limit);
        RankedReport {
            entries: self.buffer,
        }
    }

    /// Fold another ranker's retained records into this one.
    pub fn merge(&mut self, other: TopN) {
        for record in other.buffer {
            self.offer(record);
        }
    }

    /// Records currently held.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Largest number of records ever held at once.
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Total records offered.
    pub fn offered(&self) -> u64 {
        self.offered
    }

    fn compact(&mut self, keep: usize) {
        self.buffer.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        self.buffer.truncate(keep);
    }
}
