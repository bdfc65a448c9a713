//! Subtree-parallel scanning with rayon.
//!
//! Each top-level directory of the root becomes a unit of work with its own
//! [`Tally`]. Partial rankings are merged afterwards; the slack bound holds per
//! worker, so peak memory grows with the number of threads.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use super::{Auditor, Gate, ScanOutcome, ScanState, Tally};
use crate::error::{AuditError, Result};
use crate::source::{FileEntry, MetadataSource, SkippedEntry, WalkSource};

/// Immediate children of the root, split into files and same-device directories.
#[derive(Debug, Default)]
struct Partition {
    files: Vec<PathBuf>,
    subtrees: Vec<PathBuf>,
}

impl Auditor {
    /// Scan `root` by walking its top-level subtrees on the rayon pool.
    ///
    /// Enumeration always uses `walker`, whatever source the auditor was built
    /// with. Classification, gates and the final ranking are unchanged.
    pub fn scan_parallel(&mut self, root: &Path, walker: &WalkSource) -> Result<ScanOutcome> {
        let root = self.begin(root)?;
        let started = Instant::now();

        let partition = match partition(&root, walker) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Scan failed");
                self.transition(ScanState::Failed);
                return Err(e);
            }
        };
        tracing::debug!(
            subtrees = partition.subtrees.len(),
            files = partition.files.len(),
            threads = rayon::current_num_threads(),
            "Partitioned root"
        );

        let gate = Gate {
            policy: &self.policy,
            rules: &self.rules,
            now: self.now,
        };
        let progress = self.progress.as_deref();

        let mut tally = Tally::new(&self.policy);
        for path in partition.files {
            tally.consume(stat_file(path), &gate, progress);
        }

        let partials: Vec<Tally> = partition
            .subtrees
            .par_iter()
            .map(|dir| {
                let mut partial = Tally::new(gate.policy);
                match walker.entries(dir) {
                    Ok(entries) => {
                        for item in entries {
                            partial.consume(item, &gate, progress);
                        }
                    }
                    Err(e) => tracing::warn!(path = %dir.display(), error = %e, "Subtree skipped"),
                }
                partial
            })
            .collect();

        for partial in partials {
            tally.absorb(partial);
        }

        Ok(self.finish(tally, started))
    }
}

fn partition(root: &Path, walker: &WalkSource) -> Result<Partition> {
    let read_dir = fs::read_dir(root).map_err(|source| AuditError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    let root_dev = device_of(root);
    let exclusions = walker.exclusions().below(root);

    let mut partition = Partition::default();
    for child in read_dir.filter_map(|e| e.ok()) {
        let path = child.path();
        if exclusions.is_excluded(&path) {
            continue;
        }
        // DirEntry::file_type does not follow symbolic links
        let Ok(file_type) = child.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if device_of(&path) == root_dev {
                partition.subtrees.push(path);
            } else {
                tracing::debug!(path = %path.display(), "Skipping mount point");
            }
        } else if file_type.is_file() {
            partition.files.push(path);
        }
    }

    partition.files.sort();
    partition.subtrees.sort();
    Ok(partition)
}

fn stat_file(path: PathBuf) -> crate::source::EntryResult {
    if path.to_str().is_none() {
        return Err(SkippedEntry::Undecodable);
    }
    let unreadable = |err: std::io::Error, path: &Path| SkippedEntry::Unreadable {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    let metadata = fs::symlink_metadata(&path).map_err(|e| unreadable(e, &path))?;
    let modified = metadata.modified().map_err(|e| unreadable(e, &path))?;
    Ok(FileEntry::new(path, metadata.len(), modified))
}

#[cfg(unix)]
fn device_of(path: &Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    fs::symlink_metadata(path).ok().map(|m| m.dev())
}

#[cfg(not(unix))]
fn device_of(_path: &Path) -> Option<u64> {
    None
}
